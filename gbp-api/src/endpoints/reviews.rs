use super::{AccountId, LocationId, ReviewId, StarRating};
use crate::macros::setter;
use crate::{Api, Endpoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Method, Request, RequestData};

// Common

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Resource name, `accounts/{a}/locations/{l}/reviews/{r}`
    pub name: Option<String>,
    pub review_id: ReviewId,
    pub reviewer: Reviewer,
    pub star_rating: Option<StarRating>,
    /// Star-only reviews carry no comment.
    pub comment: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: Option<DateTime<Utc>>,
    pub review_reply: Option<ReviewReply>,
}

impl Review {
    pub fn has_reply(&self) -> bool {
        self.review_reply
            .as_ref()
            .is_some_and(|reply| !reply.comment.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    pub display_name: Option<String>,
    pub profile_photo_url: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReply {
    pub comment: String,
    pub update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub enum ReviewOrder {
    #[serde(rename = "updateTime desc")]
    UpdateTimeDesc,
    #[serde(rename = "rating")]
    Rating,
    #[serde(rename = "rating desc")]
    RatingDesc,
}

// Requests

#[derive(Default, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<ReviewOrder>,
}

#[derive(Debug, Clone)]
pub struct ListReviews {
    account_id: AccountId,
    location_id: LocationId,
    query: ReviewsQuery,
}

impl ListReviews {
    pub fn new(account_id: AccountId, location_id: LocationId) -> Self {
        Self {
            account_id,
            location_id,
            query: ReviewsQuery::default(),
        }
    }

    setter!(opt query.page_size: u32);
    setter!(opt query.page_token: String);
    setter!(opt query.order_by: ReviewOrder);
}

impl Request for ListReviews {
    type Data = ReviewsQuery;
    type Response = ReviewsResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        format!(
            "/accounts/{}/locations/{}/reviews",
            self.account_id, self.location_id
        )
        .into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Query(&self.query)
    }
}

impl Endpoint for ListReviews {
    const API: Api = Api::MyBusiness;
}

/// Create or overwrite the owner reply on a review.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReply {
    #[serde(skip)]
    account_id: AccountId,
    #[serde(skip)]
    location_id: LocationId,
    #[serde(skip)]
    review_id: ReviewId,
    comment: String,
}

impl UpdateReply {
    pub fn new(
        account_id: AccountId,
        location_id: LocationId,
        review_id: ReviewId,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            location_id,
            review_id,
            comment: comment.into(),
        }
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }
}

impl Request for UpdateReply {
    type Data = Self;
    type Response = ReviewReply;
    const METHOD: Method = Method::PUT;

    fn endpoint(&self) -> Cow<'_, str> {
        format!(
            "/accounts/{}/locations/{}/reviews/{}/reply",
            self.account_id, self.location_id, self.review_id
        )
        .into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

impl Endpoint for UpdateReply {
    const API: Api = Api::MyBusiness;
}

// Responses

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsResponse {
    #[serde(default)]
    pub reviews: Vec<Review>,
    pub average_rating: Option<f64>,
    pub total_review_count: Option<u32>,
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVIEWS_PAGE: &str = r#"{
        "reviews": [
            {
                "name": "accounts/1/locations/2/reviews/r-1",
                "reviewId": "r-1",
                "reviewer": {"displayName": "Asha", "isAnonymous": false},
                "starRating": "FIVE",
                "comment": "Great support team!",
                "createTime": "2024-05-02T10:15:00Z",
                "updateTime": "2024-05-02T10:15:00Z"
            },
            {
                "reviewId": "r-2",
                "reviewer": {"isAnonymous": true},
                "starRating": "THREE",
                "createTime": "2024-05-03T08:00:00.123Z",
                "reviewReply": {"comment": "Thanks!", "updateTime": "2024-05-04T08:00:00Z"}
            }
        ],
        "averageRating": 4,
        "totalReviewCount": 2,
        "nextPageToken": "page-2"
    }"#;

    #[test]
    fn deserializes_reviews_page() {
        let page: ReviewsResponse = serde_json::from_str(REVIEWS_PAGE).unwrap();

        assert_eq!(page.reviews.len(), 2);
        assert_eq!(page.next_page_token.as_deref(), Some("page-2"));

        let first = &page.reviews[0];
        assert_eq!(first.review_id, "r-1");
        assert_eq!(first.reviewer.display_name.as_deref(), Some("Asha"));
        assert!(!first.has_reply());

        let second = &page.reviews[1];
        assert!(second.comment.is_none());
        assert!(second.has_reply());
    }

    #[test]
    fn list_reviews_builds_location_path_and_query() {
        let request = ListReviews::new("accounts/1".into(), "2".into())
            .page_size(50u32)
            .page_token("next");

        assert_eq!(request.endpoint(), "/accounts/1/locations/2/reviews");
        assert_eq!(
            serde_json::to_value(&request.query).unwrap(),
            serde_json::json!({"pageSize": 50, "pageToken": "next"})
        );
    }

    #[test]
    fn update_reply_only_sends_comment() {
        let request = UpdateReply::new("1".into(), "2".into(), "r-9".into(), "Thank you!");

        assert_eq!(request.endpoint(), "/accounts/1/locations/2/reviews/r-9/reply");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"comment": "Thank you!"})
        );
    }
}
