use async_trait::async_trait;
use gbp_api::{
    endpoints::{
        accounts::Account,
        reviews::{ReviewReply, ReviewsResponse},
        AccountId, LocationId, ReviewId,
    },
    Client, GbpApiError, Request, ACCOUNT_MANAGEMENT_URL, MY_BUSINESS_URL,
};
use secrecy::SecretString;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const REVIEWS_PAGE_SIZE: u32 = 50;
const MAX_ACCOUNT_PAGES: usize = 20;

#[derive(Debug, Error)]
pub enum ApiCallError {
    #[error(transparent)]
    Gbp(#[from] GbpApiError),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ApiCallError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiCallError::Gbp(err) if err.is_unauthorized())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ApiCallError::Gbp(err) => err.is_retryable(),
            ApiCallError::Timeout(_) => true,
        }
    }
}

/// The Business Profile calls the gateway makes, one bearer token per call.
#[async_trait]
pub trait ReviewsApi: Send + Sync {
    async fn list_accounts(&self, access_token: SecretString) -> Result<Vec<Account>, ApiCallError>;

    /// One page of reviews for a location
    async fn list_reviews(
        &self,
        access_token: SecretString,
        account_id: &AccountId,
        location_id: &LocationId,
        page_token: Option<String>,
    ) -> Result<ReviewsResponse, ApiCallError>;

    async fn update_reply(
        &self,
        access_token: SecretString,
        account_id: &AccountId,
        location_id: &LocationId,
        review_id: &ReviewId,
        comment: &str,
    ) -> Result<ReviewReply, ApiCallError>;
}

/// [`ReviewsApi`] backed by the Google APIs.
pub struct GbpReviewsApi {
    timeout: Duration,
    account_management_url: String,
    my_business_url: String,
}

impl GbpReviewsApi {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_urls(timeout, ACCOUNT_MANAGEMENT_URL, MY_BUSINESS_URL)
    }

    pub fn with_base_urls(timeout: Duration, account_management_url: &str, my_business_url: &str) -> Self {
        Self {
            timeout,
            account_management_url: account_management_url.to_string(),
            my_business_url: my_business_url.to_string(),
        }
    }

    fn client(&self, access_token: &SecretString) -> Client {
        Client::with_base_urls(&self.account_management_url, &self.my_business_url, access_token)
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, ApiCallError>
    where
        F: Future<Output = Result<T, GbpApiError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ApiCallError::Timeout(self.timeout))?
            .map_err(ApiCallError::from)
    }
}

#[async_trait]
impl ReviewsApi for GbpReviewsApi {
    async fn list_accounts(&self, access_token: SecretString) -> Result<Vec<Account>, ApiCallError> {
        let client = self.client(&access_token);
        let mut accounts = Vec::new();
        let mut page_token = None;

        for _ in 0..MAX_ACCOUNT_PAGES {
            let mut request = Request::accounts().list();
            if let Some(token) = page_token.take() {
                request = request.page_token(token);
            }
            let page = self.bounded(client.send(request)).await?;
            accounts.extend(page.accounts);

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => return Ok(accounts),
            }
        }

        tracing::warn!(
            pages = MAX_ACCOUNT_PAGES,
            accounts = accounts.len(),
            "Stopped following account pages"
        );
        Ok(accounts)
    }

    async fn list_reviews(
        &self,
        access_token: SecretString,
        account_id: &AccountId,
        location_id: &LocationId,
        page_token: Option<String>,
    ) -> Result<ReviewsResponse, ApiCallError> {
        let client = self.client(&access_token);
        let mut request = Request::reviews(account_id.clone(), location_id.clone())
            .list()
            .page_size(REVIEWS_PAGE_SIZE);
        if let Some(token) = page_token {
            request = request.page_token(token);
        }
        self.bounded(client.send(request)).await
    }

    async fn update_reply(
        &self,
        access_token: SecretString,
        account_id: &AccountId,
        location_id: &LocationId,
        review_id: &ReviewId,
        comment: &str,
    ) -> Result<ReviewReply, ApiCallError> {
        let client = self.client(&access_token);
        let request =
            Request::reviews(account_id.clone(), location_id.clone()).reply(review_id.clone(), comment);
        self.bounded(client.send(request)).await
    }
}
