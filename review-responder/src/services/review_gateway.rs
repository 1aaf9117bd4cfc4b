use futures::{stream, StreamExt};
use gbp_api::endpoints::{accounts::Account, AccountId, LocationId, ReviewId};
use secrecy::SecretString;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::session_store::short;
use super::{ApiCallError, OAuthProvider, ReplyDrafter, ReviewsApi, TokenStore};
use crate::config::GbpConfiguration;
use crate::error::ServerError;
use crate::models::{ProcessStage, ProcessSummary, Review, ReviewFailure};

const PUBLISH_ATTEMPTS: u32 = 3;
const PUBLISH_BASE_DELAY: Duration = Duration::from_millis(250);
const MAX_REVIEW_PAGES: usize = 100;

/// The account and location whose reviews are served.
#[derive(Debug, Clone, PartialEq)]
pub struct GbpTarget {
    pub account_id: AccountId,
    pub location_id: LocationId,
}

impl From<&GbpConfiguration> for GbpTarget {
    fn from(config: &GbpConfiguration) -> Self {
        Self {
            account_id: AccountId::from(config.account_id.as_str()),
            location_id: LocationId::from(config.location_id.as_str()),
        }
    }
}

fn upstream(err: ApiCallError) -> ServerError {
    ServerError::Upstream(format!("Business Profile API: {}", err))
}

/// Drafts replies with the LLM and reads and writes reviews on behalf of a principal.
pub struct ReviewReplyGateway {
    tokens: Arc<TokenStore>,
    provider: Arc<dyn OAuthProvider>,
    api: Arc<dyn ReviewsApi>,
    drafter: Arc<dyn ReplyDrafter>,
    concurrency: usize,
}

impl ReviewReplyGateway {
    pub fn new(
        tokens: Arc<TokenStore>,
        provider: Arc<dyn OAuthProvider>,
        api: Arc<dyn ReviewsApi>,
        drafter: Arc<dyn ReplyDrafter>,
        concurrency: usize,
    ) -> Self {
        Self {
            tokens,
            provider,
            api,
            drafter,
            concurrency: concurrency.max(1),
        }
    }

    /// Run `call` with the principal's access token.
    ///
    /// An upstream 401 gets one refresh and one retry. A 401 on a freshly refreshed token, or a
    /// second 401, clears the pair. Other API errors are handed back in the inner result.
    async fn authorized<T, F, Fut>(
        &self,
        principal: &str,
        call: F,
    ) -> Result<Result<T, ApiCallError>, ServerError>
    where
        F: Fn(SecretString) -> Fut,
        Fut: Future<Output = Result<T, ApiCallError>>,
    {
        let grant = self
            .tokens
            .access_token(principal, self.provider.as_ref())
            .await?;

        match call(grant.access_token.clone()).await {
            Err(err) if err.is_unauthorized() => {}
            other => return Ok(other),
        }

        if grant.refreshed {
            return Err(self.reject(principal).await);
        }

        tracing::debug!(session = %short(principal), "Access token rejected, refreshing");
        let token = self
            .tokens
            .refresh_rejected(principal, &grant.access_token, self.provider.as_ref())
            .await?;

        match call(token).await {
            Err(err) if err.is_unauthorized() => Err(self.reject(principal).await),
            other => Ok(other),
        }
    }

    async fn reject(&self, principal: &str) -> ServerError {
        self.tokens.clear(principal).await;
        tracing::warn!(session = %short(principal), "Google rejected refreshed credentials");
        ServerError::Unauthenticated("Access token rejected after refresh".to_string())
    }

    pub async fn draft_reply(&self, review_text: &str) -> Result<String, ServerError> {
        let review_text = review_text.trim();
        if review_text.is_empty() {
            return Err(ServerError::MissingInput("Review text is required".to_string()));
        }
        self.drafter.complete(review_text).await
    }

    pub async fn list_accounts(&self, principal: &str) -> Result<Vec<Account>, ServerError> {
        self.authorized(principal, |token| self.api.list_accounts(token))
            .await?
            .map_err(upstream)
    }

    /// Every review of the location that has no owner reply yet, across all pages.
    #[tracing::instrument(skip_all, fields(session = %short(principal), location = %target.location_id))]
    pub async fn list_pending_reviews(
        &self,
        principal: &str,
        target: &GbpTarget,
    ) -> Result<Vec<Review>, ServerError> {
        let mut pending = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_REVIEW_PAGES {
            let page = self
                .authorized(principal, |token| {
                    self.api.list_reviews(
                        token,
                        &target.account_id,
                        &target.location_id,
                        page_token.clone(),
                    )
                })
                .await?
                .map_err(upstream)?;

            pending.extend(
                page.reviews
                    .into_iter()
                    .map(Review::from)
                    .filter(Review::is_pending),
            );

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => {
                    tracing::debug!(pending = pending.len(), "Listed pending reviews");
                    return Ok(pending);
                }
            }
        }

        tracing::warn!(
            pages = MAX_REVIEW_PAGES,
            "Stopped following review pages"
        );
        Ok(pending)
    }

    /// Write the owner reply, retrying transport failures and 5xx responses.
    pub async fn publish_reply(
        &self,
        principal: &str,
        target: &GbpTarget,
        review_id: &ReviewId,
        reply_text: &str,
    ) -> Result<(), ServerError> {
        let mut delay = PUBLISH_BASE_DELAY;
        let mut attempt = 1;

        loop {
            let result = self
                .authorized(principal, |token| {
                    self.api.update_reply(
                        token,
                        &target.account_id,
                        &target.location_id,
                        review_id,
                        reply_text,
                    )
                })
                .await?;

            match result {
                Ok(_) => {
                    tracing::debug!(review = %review_id, attempt, "Reply published");
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < PUBLISH_ATTEMPTS => {
                    tracing::warn!(review = %review_id, attempt, error = %err, "Publish failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(upstream(err)),
            }
        }
    }

    /// Draft and publish a reply for every pending review. Per-review failures are collected.
    #[tracing::instrument(skip_all, fields(session = %short(principal), location = %target.location_id))]
    pub async fn process_new_reviews(
        &self,
        principal: &str,
        target: &GbpTarget,
    ) -> Result<ProcessSummary, ServerError> {
        let pending = self.list_pending_reviews(principal, target).await?;
        let total = pending.len();

        let tasks: Vec<_> = pending
            .into_iter()
            .map(|review| self.process_review(principal, target, review))
            .collect();
        let outcomes: Vec<Result<(), ReviewFailure>> = stream::iter(tasks)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = ProcessSummary::default();
        for outcome in outcomes {
            match outcome {
                Ok(()) => summary.processed += 1,
                Err(failure) => summary.failed.push(failure),
            }
        }

        tracing::info!(
            total,
            processed = summary.processed,
            failed = summary.failed.len(),
            "Processed new reviews"
        );
        Ok(summary)
    }

    async fn process_review(
        &self,
        principal: &str,
        target: &GbpTarget,
        review: Review,
    ) -> Result<(), ReviewFailure> {
        let failure = |stage: ProcessStage, err: ServerError| {
            tracing::warn!(review = %review.id, ?stage, error = %err, "Review not answered");
            ReviewFailure {
                review_id: review.id.clone(),
                stage,
                error: err.client_message(),
            }
        };

        // Credentials cleared by an earlier review in the batch must not cost an LLM call
        if let Err(err) = self
            .tokens
            .access_token(principal, self.provider.as_ref())
            .await
        {
            return Err(failure(ProcessStage::Publish, err));
        }

        let text = review.text.as_deref().unwrap_or_default();
        let reply = match self.draft_reply(text).await {
            Ok(reply) => reply,
            Err(err) => return Err(failure(ProcessStage::Draft, err)),
        };

        if let Err(err) = self
            .publish_reply(principal, target, &review.id, &reply)
            .await
        {
            return Err(failure(ProcessStage::Publish, err));
        }

        tracing::info!(review = %review.id, "Replied to review");
        Ok(())
    }
}
