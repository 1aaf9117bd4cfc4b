use chrono::{DateTime, Utc};
use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::session_store::short;
use super::OAuthProvider;
use crate::error::ServerError;
use crate::models::{AccessGrant, TokenPair};

const EVICTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

type TokenSlot = Arc<Mutex<Option<TokenPair>>>;

struct TokenEntry {
    slot: TokenSlot,
    stored_at: DateTime<Utc>,
}

/// Server-side token pairs keyed by principal (the session id).
///
/// Each principal's pair sits behind its own async mutex. Refreshes run with that mutex held,
/// so concurrent callers queue behind an in-flight refresh and reuse its result.
#[derive(Default)]
pub struct TokenStore {
    principals: DashMap<String, TokenEntry>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose pairs are dropped `max_age_seconds` after they were issued, matching the
    /// lifetime of the session cookie that addresses them.
    pub fn with_max_age(max_age_seconds: u64) -> Arc<Self> {
        let store = Arc::new(Self::new());
        let max_age = i64::try_from(max_age_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX);

        let weak = Arc::downgrade(&store);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(EVICTION_INTERVAL);
            loop {
                interval.tick().await;
                let Some(store) = weak.upgrade() else { break };
                if let Some(cutoff) = Utc::now().checked_sub_signed(max_age) {
                    store.evict_issued_before(cutoff);
                }
            }
        });

        store
    }

    fn slot(&self, principal: &str) -> Option<TokenSlot> {
        self.principals
            .get(principal)
            .map(|entry| entry.slot.clone())
    }

    pub async fn store(&self, principal: &str, tokens: TokenPair) {
        let expires_at = tokens.expires_at;
        let slot = {
            let mut entry = self
                .principals
                .entry(principal.to_string())
                .or_insert_with(|| TokenEntry {
                    slot: TokenSlot::default(),
                    stored_at: Utc::now(),
                });
            entry.stored_at = Utc::now();
            entry.slot.clone()
        };
        *slot.lock().await = Some(tokens);
        tracing::info!(session = %short(principal), %expires_at, "Tokens issued");
    }

    /// Forget the principal's pair. Returns whether one was stored.
    pub async fn clear(&self, principal: &str) -> bool {
        let Some((_, entry)) = self.principals.remove(principal) else {
            return false;
        };
        let cleared = entry.slot.lock().await.take().is_some();
        if cleared {
            tracing::info!(session = %short(principal), "Tokens cleared");
        }
        cleared
    }

    /// Number of principals with an entry, stored or mid-refresh
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    /// Drop every pair issued before `cutoff`. Returns how many were dropped.
    pub fn evict_issued_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.principals.len();
        self.principals.retain(|principal, entry| {
            let keep = entry.stored_at >= cutoff;
            if !keep {
                tracing::debug!(session = %short(principal), "Evicting stale tokens");
            }
            keep
        });

        let evicted = before.saturating_sub(self.principals.len());
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.principals.len(), "Evicted stale tokens");
        }
        evicted
    }

    /// Remove the principal's entry once its slot was emptied by a failed refresh.
    ///
    /// A slot that was refilled or replaced in the meantime stays.
    fn forget_emptied(&self, principal: &str, slot: &TokenSlot) {
        self.principals.remove_if(principal, |_, entry| {
            Arc::ptr_eq(&entry.slot, slot)
                && entry
                    .slot
                    .try_lock()
                    .map(|guard| guard.is_none())
                    .unwrap_or(false)
        });
    }

    pub async fn expires_at(&self, principal: &str) -> Option<DateTime<Utc>> {
        let slot = self.slot(principal)?;
        let guard = slot.lock().await;
        guard.as_ref().map(|tokens| tokens.expires_at)
    }

    /// A currently valid access token, refreshing once if the stored one has expired.
    pub async fn access_token(
        &self,
        principal: &str,
        provider: &dyn OAuthProvider,
    ) -> Result<AccessGrant, ServerError> {
        let slot = self
            .slot(principal)
            .ok_or_else(|| ServerError::Unauthenticated("No tokens for session".to_string()))?;
        let mut guard = slot.lock().await;

        match guard.as_ref() {
            None => {
                return Err(ServerError::Unauthenticated(
                    "No tokens for session".to_string(),
                ))
            }
            Some(tokens) if !tokens.is_expired() => {
                return Ok(AccessGrant {
                    access_token: tokens.access_token.clone(),
                    refreshed: false,
                })
            }
            Some(_) => {}
        }

        let refreshed = refresh_locked(principal, &mut guard, provider).await;
        drop(guard);
        if refreshed.is_err() {
            self.forget_emptied(principal, &slot);
        }

        Ok(AccessGrant {
            access_token: refreshed?,
            refreshed: true,
        })
    }

    /// Replace an access token the API just rejected.
    ///
    /// If another caller already swapped the rejected token out, the current one is returned
    /// without a second refresh.
    pub async fn refresh_rejected(
        &self,
        principal: &str,
        rejected: &SecretString,
        provider: &dyn OAuthProvider,
    ) -> Result<SecretString, ServerError> {
        let slot = self
            .slot(principal)
            .ok_or_else(|| ServerError::Unauthenticated("No tokens for session".to_string()))?;
        let mut guard = slot.lock().await;

        match guard.as_ref() {
            None => {
                return Err(ServerError::Unauthenticated(
                    "Tokens were cleared".to_string(),
                ))
            }
            Some(tokens)
                if tokens.access_token.expose_secret() != rejected.expose_secret()
                    && !tokens.is_expired() =>
            {
                return Ok(tokens.access_token.clone());
            }
            Some(_) => {}
        }

        let refreshed = refresh_locked(principal, &mut guard, provider).await;
        drop(guard);
        if refreshed.is_err() {
            self.forget_emptied(principal, &slot);
        }
        refreshed
    }
}

async fn refresh_locked(
    principal: &str,
    slot: &mut Option<TokenPair>,
    provider: &dyn OAuthProvider,
) -> Result<SecretString, ServerError> {
    let Some(tokens) = slot.as_mut() else {
        return Err(ServerError::Unauthenticated(
            "No tokens for session".to_string(),
        ));
    };

    let Some(refresh_token) = tokens.refresh_token.as_ref() else {
        *slot = None;
        tracing::warn!(session = %short(principal), "Access token expired and no refresh token held; tokens cleared");
        return Err(ServerError::Unauthenticated(
            "Access token expired".to_string(),
        ));
    };

    let result = provider.refresh(refresh_token).await;
    match result {
        Ok(refreshed) => {
            tokens.apply_refresh(refreshed);
            tracing::info!(
                session = %short(principal),
                expires_at = %tokens.expires_at,
                "Tokens refreshed"
            );
            Ok(tokens.access_token.clone())
        }
        Err(err @ ServerError::Unauthenticated(_)) => {
            *slot = None;
            tracing::warn!(session = %short(principal), "Refresh rejected; tokens cleared");
            Err(err)
        }
        Err(err) => {
            tracing::warn!(session = %short(principal), error = %err, "Refresh failed");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{token_pair, FakeOAuthProvider};
    use std::time::Duration;

    #[tokio::test]
    async fn unknown_principal_is_unauthenticated() {
        let store = TokenStore::new();
        let provider = FakeOAuthProvider::new();

        let result = store.access_token("nobody", &provider).await;
        assert!(matches!(result, Err(ServerError::Unauthenticated(_))));
        assert_eq!(provider.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn valid_token_is_returned_without_refresh() {
        let store = TokenStore::new();
        let provider = FakeOAuthProvider::new();
        store
            .store("s1", token_pair("access-1", Some("refresh-1"), 3600))
            .await;

        let grant = store.access_token("s1", &provider).await.unwrap();
        assert_eq!(grant.access_token.expose_secret(), "access-1");
        assert!(!grant.refreshed);
        assert_eq!(provider.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_in_place() {
        let store = TokenStore::new();
        let provider = FakeOAuthProvider::new();
        store
            .store("s1", token_pair("stale", Some("refresh-1"), -5))
            .await;

        let grant = store.access_token("s1", &provider).await.unwrap();
        assert!(grant.refreshed);
        assert_eq!(grant.access_token.expose_secret(), "refreshed-1");
        assert_eq!(provider.refresh_calls(), 1);

        // Served from the updated pair afterwards
        let again = store.access_token("s1", &provider).await.unwrap();
        assert_eq!(again.access_token.expose_secret(), "refreshed-1");
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let store = Arc::new(TokenStore::new());
        let provider = Arc::new(FakeOAuthProvider::new().with_refresh_delay(Duration::from_millis(50)));
        store
            .store("s1", token_pair("stale", Some("refresh-1"), -5))
            .await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let provider = provider.clone();
            handles.push(tokio::spawn(async move {
                store
                    .access_token("s1", provider.as_ref())
                    .await
                    .map(|grant| grant.access_token.expose_secret().to_string())
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "refreshed-1");
        }
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn rejected_refresh_clears_tokens() {
        let store = TokenStore::new();
        let provider = FakeOAuthProvider::new().rejecting_refresh();
        store
            .store("s1", token_pair("stale", Some("revoked"), -5))
            .await;

        let result = store.access_token("s1", &provider).await;
        assert!(matches!(result, Err(ServerError::Unauthenticated(_))));
        assert!(store.expires_at("s1").await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn rejected_refresh_after_unauthorized_call_drops_principal() {
        let store = TokenStore::new();
        let provider = FakeOAuthProvider::new().rejecting_refresh();
        store
            .store("s1", token_pair("access-1", Some("revoked"), 3600))
            .await;
        store
            .store("s2", token_pair("access-2", Some("refresh-2"), 3600))
            .await;

        let rejected = SecretString::from("access-1".to_string());
        let result = store.refresh_rejected("s1", &rejected, &provider).await;

        assert!(matches!(result, Err(ServerError::Unauthenticated(_))));
        assert_eq!(store.len(), 1);
        assert!(store.expires_at("s2").await.is_some());
    }

    #[tokio::test]
    async fn transient_refresh_failure_keeps_principal() {
        let store = TokenStore::new();
        let provider = FakeOAuthProvider::new().failing_refresh();
        store
            .store("s1", token_pair("stale", Some("refresh-1"), -5))
            .await;

        let result = store.access_token("s1", &provider).await;

        assert!(matches!(result, Err(ServerError::Upstream(_))));
        assert_eq!(store.len(), 1);
        assert!(store.expires_at("s1").await.is_some());
    }

    #[tokio::test]
    async fn concurrent_unauthorized_callers_share_one_refresh() {
        let store = Arc::new(TokenStore::new());
        let provider = Arc::new(FakeOAuthProvider::new().with_refresh_delay(Duration::from_millis(50)));
        store
            .store("s1", token_pair("access-1", Some("refresh-1"), 3600))
            .await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let provider = provider.clone();
            handles.push(tokio::spawn(async move {
                let rejected = SecretString::from("access-1".to_string());
                store
                    .refresh_rejected("s1", &rejected, provider.as_ref())
                    .await
                    .map(|token| token.expose_secret().to_string())
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "refreshed-1");
        }
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn pairs_issued_before_cutoff_are_evicted() {
        let store = TokenStore::new();
        store
            .store("old", token_pair("access-old", Some("refresh-old"), 3600))
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let cutoff = Utc::now();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store
            .store("new", token_pair("access-new", Some("refresh-new"), 3600))
            .await;

        assert_eq!(store.evict_issued_before(cutoff), 1);
        assert!(store.expires_at("old").await.is_none());
        assert!(store.expires_at("new").await.is_some());
        assert_eq!(store.evict_issued_before(cutoff), 0);
    }

    #[tokio::test]
    async fn expired_pair_without_refresh_token_is_cleared() {
        let store = TokenStore::new();
        let provider = FakeOAuthProvider::new();
        store.store("s1", token_pair("stale", None, -5)).await;

        let result = store.access_token("s1", &provider).await;
        assert!(matches!(result, Err(ServerError::Unauthenticated(_))));
        assert_eq!(provider.refresh_calls(), 0);
        assert!(store.expires_at("s1").await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn refresh_rejected_reuses_token_swapped_by_another_caller() {
        let store = TokenStore::new();
        let provider = FakeOAuthProvider::new();
        store
            .store("s1", token_pair("current", Some("refresh-1"), 3600))
            .await;

        let rejected = SecretString::from("older".to_string());
        let token = store
            .refresh_rejected("s1", &rejected, &provider)
            .await
            .unwrap();
        assert_eq!(token.expose_secret(), "current");
        assert_eq!(provider.refresh_calls(), 0);

        let rejected = SecretString::from("current".to_string());
        let token = store
            .refresh_rejected("s1", &rejected, &provider)
            .await
            .unwrap();
        assert_eq!(token.expose_secret(), "refreshed-1");
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn clear_reports_whether_tokens_existed() {
        let store = TokenStore::new();
        store
            .store("s1", token_pair("access", Some("refresh"), 3600))
            .await;

        assert!(store.expires_at("s1").await.is_some());
        assert!(store.clear("s1").await);
        assert!(!store.clear("s1").await);
    }
}
