use serde::{Deserialize, Serialize};
use tower_api_client::{Error as ApiError, StatusCode};

#[derive(Debug)]
pub enum GbpApiError {
    Google(StatusCode, ErrorDetail),
    Internal(ApiError),
}

impl GbpApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GbpApiError::Google(status, _) => Some(*status),
            GbpApiError::Internal(_) => None,
        }
    }

    /// The access token was rejected (expired, revoked or malformed).
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Transport failures and 5xx answers; anything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            GbpApiError::Google(status, _) => status.is_server_error(),
            GbpApiError::Internal(ApiError::Hyper(_) | ApiError::Io(_)) => true,
            GbpApiError::Internal(_) => false,
        }
    }
}

impl From<ApiError> for GbpApiError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::ClientError(status, detail) | ApiError::ServerError(status, detail) => {
                let error = match serde_json::from_str::<ErrorResponse>(&detail) {
                    Ok(response) => response.error,
                    Err(_) => ErrorDetail {
                        code: status.as_u16(),
                        message: detail.to_string(),
                        status: None,
                    },
                };
                GbpApiError::Google(status, error)
            }
            e => GbpApiError::Internal(e),
        }
    }
}

impl std::fmt::Display for GbpApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GbpApiError::Internal(e) => write!(f, "Internal error: {}", e),
            GbpApiError::Google(status, detail) => match &detail.status {
                Some(kind) => write!(f, "({}) {}: {}", status, kind, detail.message),
                None => write!(f, "({}) {}", status, detail.message),
            },
        }
    }
}

impl std::error::Error for GbpApiError {}

/// Google's JSON error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_google_error_envelope() {
        let body = r#"{"error":{"code":401,"message":"Request had invalid authentication credentials.","status":"UNAUTHENTICATED"}}"#;
        let error: GbpApiError =
            ApiError::ClientError(StatusCode::UNAUTHORIZED, body.to_string()).into();

        assert!(error.is_unauthorized());
        assert!(!error.is_retryable());
        match error {
            GbpApiError::Google(_, detail) => {
                assert_eq!(detail.status.as_deref(), Some("UNAUTHENTICATED"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn keeps_raw_body_when_envelope_is_missing() {
        let error: GbpApiError =
            ApiError::ServerError(StatusCode::BAD_GATEWAY, "upstream hiccup".to_string()).into();

        assert!(error.is_retryable());
        assert_eq!(error.to_string(), "(502 Bad Gateway) upstream hiccup");
    }

    #[test]
    fn undecodable_success_body_is_not_retried() {
        let decode = serde_json::from_str::<ErrorResponse>("not json").unwrap_err();
        let error: GbpApiError = ApiError::SerdeJson(decode).into();

        assert!(!error.is_retryable());
        assert!(!error.is_unauthorized());
    }

    #[test]
    fn io_failure_is_retried() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let error: GbpApiError = ApiError::Io(io).into();

        assert!(error.is_retryable());
    }
}
