use std::sync::Arc;

use super::session_store::short;
use super::{random_token, OAuthProvider, SessionStore};
use crate::error::ServerError;
use crate::models::{CallbackParams, TokenPair};

/// Authorization-code flow bound to browser sessions.
pub struct AuthorizationFlow {
    provider: Arc<dyn OAuthProvider>,
    sessions: SessionStore,
}

impl AuthorizationFlow {
    pub fn new(provider: Arc<dyn OAuthProvider>, sessions: SessionStore) -> Self {
        Self { provider, sessions }
    }

    /// Start a new attempt for the session and return the consent URL.
    pub fn begin_authorization(&self, session_id: &str) -> Result<String, ServerError> {
        let state = random_token();
        let url = self.provider.authorization_url(&state)?;
        self.sessions.begin(session_id, state);

        tracing::info!(session = %short(session_id), "Authorization started");
        Ok(url)
    }

    /// Validate the provider callback and exchange its code.
    ///
    /// The pending nonce is consumed before anything else is checked, so it is gone whatever the
    /// outcome. The token endpoint is only contacted once the state matched.
    pub async fn complete_authorization(
        &self,
        session_id: &str,
        params: CallbackParams,
    ) -> Result<TokenPair, ServerError> {
        let pending = self.sessions.take(session_id);
        let matches = match (&pending, params.state.as_deref()) {
            (Some(pending), Some(state)) => pending.state == state,
            _ => false,
        };
        if !matches {
            tracing::warn!(
                session = %short(session_id),
                pending = pending.is_some(),
                "Authorization state mismatch"
            );
            return Err(ServerError::StateMismatch);
        }

        if let Some(reason) = params.error {
            tracing::info!(session = %short(session_id), %reason, "Authorization denied");
            return Err(ServerError::AuthorizationDenied(reason));
        }

        let code = params
            .code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| ServerError::MissingInput("Missing authorization code".to_string()))?;

        let tokens = self.provider.exchange_code(&code).await.map_err(|err| {
            tracing::warn!(session = %short(session_id), error = %err, "Code exchange failed");
            err
        })?;
        Ok(tokens)
    }

    /// Drop any pending attempt for the session
    pub fn abandon(&self, session_id: &str) {
        self.sessions.discard(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeOAuthProvider;
    use secrecy::ExposeSecret;

    fn flow() -> (AuthorizationFlow, Arc<FakeOAuthProvider>) {
        let provider = Arc::new(FakeOAuthProvider::new());
        let flow = AuthorizationFlow::new(provider.clone(), SessionStore::new(600));
        (flow, provider)
    }

    fn state_of(url: &str) -> String {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    fn callback(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: None,
        }
    }

    #[tokio::test]
    async fn matching_state_succeeds_exactly_once() {
        let (flow, provider) = flow();
        let state = state_of(&flow.begin_authorization("s1").unwrap());

        let tokens = flow
            .complete_authorization("s1", callback(Some("code-1"), Some(&state)))
            .await
            .unwrap();
        assert_eq!(tokens.access_token.expose_secret(), "access-for-code-1");
        assert_eq!(provider.exchange_calls(), 1);

        let replay = flow
            .complete_authorization("s1", callback(Some("code-1"), Some(&state)))
            .await;
        assert!(matches!(replay, Err(ServerError::StateMismatch)));
        assert_eq!(provider.exchange_calls(), 1);
    }

    #[tokio::test]
    async fn mismatched_state_never_reaches_token_endpoint() {
        let (flow, provider) = flow();
        let state = state_of(&flow.begin_authorization("s1").unwrap());

        for forged in [Some("forged"), Some(""), None] {
            flow.begin_authorization("s1").unwrap();
            let result = flow
                .complete_authorization("s1", callback(Some("code-1"), forged))
                .await;
            assert!(matches!(result, Err(ServerError::StateMismatch)));
        }

        // The original nonce was replaced, and consumed by the failed attempts
        let result = flow
            .complete_authorization("s1", callback(Some("code-1"), Some(&state)))
            .await;
        assert!(matches!(result, Err(ServerError::StateMismatch)));
        assert_eq!(provider.exchange_calls(), 0);
    }

    #[tokio::test]
    async fn state_from_another_session_is_rejected() {
        let (flow, provider) = flow();
        let state_a = state_of(&flow.begin_authorization("session-a").unwrap());
        flow.begin_authorization("session-b").unwrap();

        let result = flow
            .complete_authorization("session-b", callback(Some("code"), Some(&state_a)))
            .await;
        assert!(matches!(result, Err(ServerError::StateMismatch)));
        assert_eq!(provider.exchange_calls(), 0);
    }

    #[tokio::test]
    async fn new_flow_invalidates_previous_nonce() {
        let (flow, _) = flow();
        let first = state_of(&flow.begin_authorization("s1").unwrap());
        let second = state_of(&flow.begin_authorization("s1").unwrap());
        assert_ne!(first, second);

        let result = flow
            .complete_authorization("s1", callback(Some("code"), Some(&first)))
            .await;
        assert!(matches!(result, Err(ServerError::StateMismatch)));
    }

    #[tokio::test]
    async fn missing_code_consumes_nonce() {
        let (flow, provider) = flow();
        let state = state_of(&flow.begin_authorization("s1").unwrap());

        let result = flow
            .complete_authorization("s1", callback(None, Some(&state)))
            .await;
        assert!(matches!(result, Err(ServerError::MissingInput(_))));

        let retry = flow
            .complete_authorization("s1", callback(Some("code"), Some(&state)))
            .await;
        assert!(matches!(retry, Err(ServerError::StateMismatch)));
        assert_eq!(provider.exchange_calls(), 0);
    }

    #[tokio::test]
    async fn provider_error_is_authorization_denied() {
        let (flow, provider) = flow();
        let state = state_of(&flow.begin_authorization("s1").unwrap());

        let params = CallbackParams {
            code: None,
            state: Some(state),
            error: Some("access_denied".to_string()),
        };
        let result = flow.complete_authorization("s1", params).await;
        assert!(matches!(result, Err(ServerError::AuthorizationDenied(reason)) if reason == "access_denied"));
        assert_eq!(provider.exchange_calls(), 0);
    }

    #[tokio::test]
    async fn failed_exchange_still_consumes_nonce() {
        let provider = Arc::new(FakeOAuthProvider::new().failing_exchange());
        let flow = AuthorizationFlow::new(provider.clone(), SessionStore::new(600));
        let state = state_of(&flow.begin_authorization("s1").unwrap());

        let result = flow
            .complete_authorization("s1", callback(Some("code"), Some(&state)))
            .await;
        assert!(matches!(result, Err(ServerError::Upstream(_))));

        let retry = flow
            .complete_authorization("s1", callback(Some("code"), Some(&state)))
            .await;
        assert!(matches!(retry, Err(ServerError::StateMismatch)));
        assert_eq!(provider.exchange_calls(), 1);
    }

    #[tokio::test]
    async fn abandon_drops_pending_nonce() {
        let (flow, _) = flow();
        let state = state_of(&flow.begin_authorization("s1").unwrap());
        flow.abandon("s1");

        let result = flow
            .complete_authorization("s1", callback(Some("code"), Some(&state)))
            .await;
        assert!(matches!(result, Err(ServerError::StateMismatch)));
    }
}
