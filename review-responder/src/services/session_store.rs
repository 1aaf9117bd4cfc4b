use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::models::PendingAuthorization;

/// Pending authorization attempts, at most one per session.
pub struct SessionStore {
    pending: Arc<DashMap<String, PendingAuthorization>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_seconds: u64) -> Self {
        let store = Self {
            pending: Arc::new(DashMap::new()),
            ttl: Duration::from_secs(ttl_seconds),
        };

        // Spawn background cleanup task
        let pending_clone = store.pending.clone();
        let ttl_clone = store.ttl;
        tokio::spawn(async move {
            cleanup_expired_attempts(pending_clone, ttl_clone).await;
        });

        tracing::info!(
            "Session store initialized with TTL of {} seconds",
            ttl_seconds
        );
        store
    }

    /// Record a new pending attempt, replacing any earlier one for the session
    pub fn begin(&self, session_id: &str, state: String) {
        let attempt = PendingAuthorization {
            session_id: session_id.to_string(),
            state,
            created_at: Utc::now(),
        };
        if self
            .pending
            .insert(session_id.to_string(), attempt)
            .is_some()
        {
            tracing::debug!(session = %short(session_id), "Replaced pending authorization");
        }
    }

    /// Remove and return the pending attempt. Expired attempts are dropped and reported as absent.
    pub fn take(&self, session_id: &str) -> Option<PendingAuthorization> {
        let (_, attempt) = self.pending.remove(session_id)?;
        if is_expired(&attempt, self.ttl) {
            tracing::debug!(session = %short(session_id), "Pending authorization expired");
            return None;
        }
        Some(attempt)
    }

    /// Drop the pending attempt, if any
    pub fn discard(&self, session_id: &str) {
        self.pending.remove(session_id);
    }

    /// Get pending attempt count (for monitoring)
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

fn is_expired(attempt: &PendingAuthorization, ttl: Duration) -> bool {
    let age = Utc::now()
        .signed_duration_since(attempt.created_at)
        .to_std()
        .unwrap_or(Duration::ZERO);
    age >= ttl
}

/// Shortened session id for log fields.
pub(crate) fn short(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}

/// Background task that periodically cleans up expired attempts
async fn cleanup_expired_attempts(
    pending: Arc<DashMap<String, PendingAuthorization>>,
    ttl: Duration,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let initial_count = pending.len();

        pending.retain(|_, attempt| {
            if is_expired(attempt, ttl) {
                tracing::debug!(
                    session = %short(&attempt.session_id),
                    "Cleaning up expired authorization attempt"
                );
                false
            } else {
                true
            }
        });

        let cleaned = initial_count.saturating_sub(pending.len());
        if cleaned > 0 {
            tracing::info!(
                "Cleaned up {} expired authorization attempts, {} remaining",
                cleaned,
                pending.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn take_consumes_the_attempt() {
        let store = SessionStore::new(600);
        store.begin("session-1", "nonce".to_string());

        let attempt = store.take("session-1").unwrap();
        assert_eq!(attempt.state, "nonce");
        assert!(store.take("session-1").is_none());
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn begin_replaces_previous_nonce() {
        let store = SessionStore::new(600);
        store.begin("session-1", "first".to_string());
        store.begin("session-1", "second".to_string());

        assert_eq!(store.pending_count(), 1);
        assert_eq!(store.take("session-1").unwrap().state, "second");
    }

    #[tokio::test]
    async fn expired_attempts_are_absent() {
        let store = SessionStore::new(0);
        store.begin("session-1", "nonce".to_string());

        assert!(store.take("session-1").is_none());
    }

    #[test]
    fn short_handles_short_ids() {
        assert_eq!(short("abcdefghijkl"), "abcdefgh");
        assert_eq!(short("abc"), "abc");
    }
}
