use async_trait::async_trait;
use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use gbp_api::{
    endpoints::{
        accounts::Account,
        reviews::{self, ReviewReply, Reviewer, ReviewsResponse},
        AccountId, LocationId, ReviewId, StarRating,
    },
    ErrorDetail, GbpApiError, StatusCode,
};
use secrecy::{ExposeSecret, SecretString};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ServerError;
use crate::handlers;
use crate::models::TokenPair;
use crate::services::{
    ApiCallError, AuthorizationFlow, GbpTarget, OAuthProvider, ReplyDrafter, ReviewReplyGateway,
    ReviewsApi, SessionKeys, SessionStore, TokenStore, session_keys::SESSION_COOKIE,
};
use crate::AppState;

pub const TEST_SESSION_SECRET: &str = "test-session-secret-0123456789abcdef";

/// Token pair expiring `expires_in_secs` from now (negative for already expired).
pub fn token_pair(access: &str, refresh: Option<&str>, expires_in_secs: i64) -> TokenPair {
    TokenPair {
        access_token: SecretString::from(access.to_string()),
        refresh_token: refresh.map(|token| SecretString::from(token.to_string())),
        expires_at: Utc::now() + ChronoDuration::seconds(expires_in_secs),
    }
}

/// Upstream review as the Business Profile API would return it
pub fn review(id: &str, comment: Option<&str>, reply: Option<&str>) -> reviews::Review {
    reviews::Review {
        name: Some(format!("accounts/acc-1/locations/loc-1/reviews/{}", id)),
        review_id: ReviewId::from(id),
        reviewer: Reviewer {
            display_name: Some(format!("Reviewer {}", id)),
            ..Reviewer::default()
        },
        star_rating: Some(StarRating::Five),
        comment: comment.map(str::to_string),
        create_time: Utc::now(),
        update_time: None,
        review_reply: reply.map(|comment| ReviewReply {
            comment: comment.to_string(),
            update_time: None,
        }),
    }
}

pub fn account(id: &str, name: &str) -> Account {
    Account {
        name: format!("accounts/{}", id),
        account_name: Some(name.to_string()),
        account_type: None,
        role: None,
        verification_state: None,
        vetted_state: None,
    }
}

fn google_error(code: u16, message: &str) -> ApiCallError {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    ApiCallError::Gbp(GbpApiError::Google(
        status,
        ErrorDetail {
            code,
            message: message.to_string(),
            status: None,
        },
    ))
}

/// Mock token endpoint
///
/// Exchanges always succeed with `access-for-{code}` unless told otherwise. Refreshes hand out
/// `refreshed-{n}` where `n` counts refresh calls.
#[derive(Default)]
pub struct FakeOAuthProvider {
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    refresh_delay: Duration,
    reject_refresh: bool,
    fail_refresh: bool,
    fail_exchange: bool,
}

impl FakeOAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn rejecting_refresh(mut self) -> Self {
        self.reject_refresh = true;
        self
    }

    /// Refreshes fail like an unreachable token endpoint
    pub fn failing_refresh(mut self) -> Self {
        self.fail_refresh = true;
        self
    }

    pub fn failing_exchange(mut self) -> Self {
        self.fail_exchange = true;
        self
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuthProvider {
    fn authorization_url(&self, state: &str) -> Result<String, ServerError> {
        Ok(format!(
            "https://accounts.example.test/o/oauth2/auth?client_id=test-client&response_type=code&state={}",
            state
        ))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenPair, ServerError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_exchange {
            return Err(ServerError::Upstream(
                "Token request failed: invalid_grant".to_string(),
            ));
        }
        Ok(token_pair(
            &format!("access-for-{}", code),
            Some(&format!("refresh-for-{}", code)),
            3600,
        ))
    }

    async fn refresh(&self, _refresh_token: &SecretString) -> Result<TokenPair, ServerError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        if self.reject_refresh {
            return Err(ServerError::Unauthenticated(
                "Refresh rejected: invalid_grant".to_string(),
            ));
        }
        if self.fail_refresh {
            return Err(ServerError::Upstream("Token endpoint unreachable".to_string()));
        }
        Ok(token_pair(&format!("refreshed-{}", n), None, 3600))
    }
}

/// Mock LLM. Fails any review containing `FAIL`.
#[derive(Default)]
pub struct FakeDrafter {
    calls: AtomicUsize,
}

impl FakeDrafter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplyDrafter for FakeDrafter {
    async fn complete(&self, review_text: &str) -> Result<String, ServerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if review_text.contains("FAIL") {
            return Err(ServerError::Upstream("LLM API error: 500".to_string()));
        }
        Ok(format!("Thanks for your review: {}", review_text))
    }
}

/// In-memory Business Profile location.
///
/// Page tokens are offsets into the review list. Replies written through `update_reply` show up
/// in later listings.
pub struct FakeReviewsApi {
    reviews: Mutex<Vec<reviews::Review>>,
    accounts: Vec<Account>,
    account_failure: Option<u16>,
    page_size: usize,
    update_failures: Mutex<VecDeque<u16>>,
    rejected_tokens: Vec<String>,
    reject_all: bool,
    list_calls: AtomicUsize,
    update_calls: AtomicUsize,
    account_calls: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
}

impl Default for FakeReviewsApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeReviewsApi {
    pub fn new() -> Self {
        Self {
            reviews: Mutex::new(Vec::new()),
            accounts: vec![account("acc-1", "Corner Cafe")],
            account_failure: None,
            page_size: 50,
            update_failures: Mutex::new(VecDeque::new()),
            rejected_tokens: Vec::new(),
            reject_all: false,
            list_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
            tokens_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reviews(self, reviews: Vec<reviews::Review>) -> Self {
        *self.reviews.lock().unwrap() = reviews;
        self
    }

    pub fn with_accounts(mut self, accounts: Vec<Account>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn failing_account_listing(mut self, status: u16) -> Self {
        self.account_failure = Some(status);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Status codes returned by successive `update_reply` calls before they start succeeding
    pub fn failing_updates(self, statuses: Vec<u16>) -> Self {
        *self.update_failures.lock().unwrap() = statuses.into();
        self
    }

    pub fn rejecting_token(mut self, token: &str) -> Self {
        self.rejected_tokens.push(token.to_string());
        self
    }

    pub fn rejecting_all_tokens(mut self) -> Self {
        self.reject_all = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }

    pub fn reply_for(&self, review_id: &str) -> Option<String> {
        self.reviews
            .lock()
            .unwrap()
            .iter()
            .find(|review| review.review_id == review_id)
            .and_then(|review| review.review_reply.as_ref())
            .map(|reply| reply.comment.clone())
    }

    fn check_token(&self, token: &SecretString) -> Result<(), ApiCallError> {
        let token = token.expose_secret().to_string();
        let rejected = self.reject_all || self.rejected_tokens.contains(&token);
        self.tokens_seen.lock().unwrap().push(token);
        if rejected {
            return Err(google_error(401, "Request had invalid authentication credentials."));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewsApi for FakeReviewsApi {
    async fn list_accounts(&self, access_token: SecretString) -> Result<Vec<Account>, ApiCallError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.check_token(&access_token)?;
        if let Some(status) = self.account_failure {
            return Err(google_error(status, "Scripted failure"));
        }
        Ok(self.accounts.clone())
    }

    async fn list_reviews(
        &self,
        access_token: SecretString,
        _account_id: &AccountId,
        _location_id: &LocationId,
        page_token: Option<String>,
    ) -> Result<ReviewsResponse, ApiCallError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_token(&access_token)?;

        let reviews = self.reviews.lock().unwrap();
        let start = page_token
            .and_then(|token| token.parse::<usize>().ok())
            .unwrap_or(0)
            .min(reviews.len());
        let end = (start + self.page_size).min(reviews.len());

        Ok(ReviewsResponse {
            reviews: reviews[start..end].to_vec(),
            average_rating: None,
            total_review_count: Some(reviews.len() as u32),
            next_page_token: (end < reviews.len()).then(|| end.to_string()),
        })
    }

    async fn update_reply(
        &self,
        access_token: SecretString,
        _account_id: &AccountId,
        _location_id: &LocationId,
        review_id: &ReviewId,
        comment: &str,
    ) -> Result<ReviewReply, ApiCallError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_token(&access_token)?;

        if let Some(status) = self.update_failures.lock().unwrap().pop_front() {
            return Err(google_error(status, "Scripted failure"));
        }

        let mut reviews = self.reviews.lock().unwrap();
        let review = reviews
            .iter_mut()
            .find(|review| &review.review_id == review_id)
            .ok_or_else(|| google_error(404, "Requested entity was not found."))?;

        let reply = ReviewReply {
            comment: comment.to_string(),
            update_time: Some(Utc::now()),
        };
        review.review_reply = Some(reply.clone());
        Ok(reply)
    }
}

/// Full router wired to fakes
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub provider: Arc<FakeOAuthProvider>,
    pub api: Arc<FakeReviewsApi>,
    pub drafter: Arc<FakeDrafter>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(FakeOAuthProvider::new(), FakeReviewsApi::new())
    }

    pub fn with_api(api: FakeReviewsApi) -> Self {
        Self::build(FakeOAuthProvider::new(), api)
    }

    pub fn build(provider: FakeOAuthProvider, api: FakeReviewsApi) -> Self {
        let provider = Arc::new(provider);
        let api = Arc::new(api);
        let drafter = Arc::new(FakeDrafter::new());
        let tokens = Arc::new(TokenStore::new());

        let authorization = Arc::new(AuthorizationFlow::new(
            provider.clone(),
            SessionStore::new(600),
        ));
        let gateway = Arc::new(ReviewReplyGateway::new(
            tokens.clone(),
            provider.clone(),
            api.clone(),
            drafter.clone(),
            4,
        ));
        let session_keys = Arc::new(SessionKeys::new(
            SecretString::from(TEST_SESSION_SECRET.to_string()),
            false,
            3600,
        ));

        let state = AppState {
            authorization,
            tokens,
            gateway,
            session_keys,
            target: GbpTarget {
                account_id: AccountId::from("acc-1"),
                location_id: LocationId::from("loc-1"),
            },
        };
        let router = handlers::router(state.clone(), Duration::from_secs(5));

        Self {
            router,
            state,
            provider,
            api,
            drafter,
        }
    }

    /// A fresh session id and the `Cookie` header value carrying it
    pub fn session(&self) -> (String, String) {
        let (session_id, value) = self.state.session_keys.issue();
        (session_id, format!("{}={}", SESSION_COOKIE, value))
    }

    /// A session that already holds a valid token pair
    pub async fn signed_in_session(&self) -> (String, String) {
        let (session_id, cookie) = self.session();
        self.state
            .tokens
            .store(&session_id, token_pair("access-1", Some("refresh-1"), 3600))
            .await;
        (session_id, cookie)
    }
}
