use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("State mismatch")]
    StateMismatch,

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::MissingInput(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::StateMismatch | ServerError::AuthorizationDenied(_) => {
                StatusCode::FORBIDDEN
            }
            ServerError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ServerError::Upstream(_)
            | ServerError::Configuration(_)
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to a client. Upstream and internal detail stays in the logs.
    pub fn client_message(&self) -> String {
        match self {
            ServerError::MissingInput(msg) => msg.clone(),
            ServerError::PayloadTooLarge(_) => self.to_string(),
            ServerError::StateMismatch => {
                "Invalid or expired authorization state, please restart the sign-in".to_string()
            }
            ServerError::AuthorizationDenied(reason) => {
                format!("Authorization was denied: {}", reason)
            }
            ServerError::Unauthenticated(_) => {
                "Not authenticated with Google, visit /auth to sign in".to_string()
            }
            ServerError::Upstream(_) => "Upstream service unavailable".to_string(),
            ServerError::Configuration(_) | ServerError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::Upstream(detail) | ServerError::Internal(detail) = &self {
            tracing::debug!(%detail, "Request failed");
        }

        let body = Json(json!({
            "error": self.client_message(),
        }));

        (self.status(), body).into_response()
    }
}

impl
    From<
        oauth2::RequestTokenError<
            reqwest::Error,
            oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>,
        >,
    > for ServerError
{
    fn from(
        err: oauth2::RequestTokenError<
            reqwest::Error,
            oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>,
        >,
    ) -> Self {
        ServerError::Upstream(format!("Token request failed: {}", err))
    }
}

impl From<config::ConfigError> for ServerError {
    fn from(err: config::ConfigError) -> Self {
        ServerError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(
            ServerError::MissingInput("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::PayloadTooLarge(1024).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ServerError::StateMismatch.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ServerError::Unauthenticated("expired".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::Upstream("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn upstream_detail_is_not_sent_to_client() {
        let response =
            ServerError::Upstream("invalid_client: secret=hunter2".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(!body.contains("hunter2"));
        assert!(body.contains("Upstream service unavailable"));
    }
}
