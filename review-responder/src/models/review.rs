use chrono::{DateTime, Utc};
use gbp_api::endpoints::{reviews, ReviewId, StarRating};
use serde::Serialize;

/// Read-only snapshot of a Google review, fetched per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub author_display_name: Option<String>,
    pub star_rating: Option<u8>,
    pub text: Option<String>,
    pub create_time: DateTime<Utc>,
    pub existing_reply: Option<String>,
}

impl Review {
    pub fn is_pending(&self) -> bool {
        self.existing_reply.is_none()
    }
}

impl From<reviews::Review> for Review {
    fn from(review: reviews::Review) -> Self {
        let existing_reply = review
            .review_reply
            .map(|reply| reply.comment)
            .filter(|comment| !comment.trim().is_empty());

        Self {
            id: review.review_id,
            author_display_name: review.reviewer.display_name,
            star_rating: review.star_rating.as_ref().and_then(StarRating::stars),
            text: review.comment,
            create_time: review.create_time,
            existing_reply,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStage {
    Draft,
    Publish,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewFailure {
    pub review_id: ReviewId,
    pub stage: ProcessStage,
    pub error: String,
}

/// Outcome of one `process-new` batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessSummary {
    pub processed: usize,
    pub failed: Vec<ReviewFailure>,
}
