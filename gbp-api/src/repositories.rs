use crate::endpoints::{
    AccountId, LocationId, ReviewId,
    accounts::ListAccounts,
    reviews::{ListReviews, UpdateReply},
};

#[derive(Default)]
pub struct AccountRepository;

impl AccountRepository {
    pub fn new() -> Self {
        Self
    }

    pub fn list(&self) -> ListAccounts {
        ListAccounts::new()
    }
}

pub struct ReviewRepository {
    account_id: AccountId,
    location_id: LocationId,
}

impl ReviewRepository {
    pub fn new(account_id: AccountId, location_id: LocationId) -> Self {
        Self {
            account_id,
            location_id,
        }
    }

    pub fn list(&self) -> ListReviews {
        ListReviews::new(self.account_id.clone(), self.location_id.clone())
    }

    pub fn reply<R>(&self, review_id: R, comment: impl Into<String>) -> UpdateReply
    where
        R: Into<ReviewId>,
    {
        UpdateReply::new(
            self.account_id.clone(),
            self.location_id.clone(),
            review_id.into(),
            comment,
        )
    }
}
