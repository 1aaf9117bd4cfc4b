use chrono::{DateTime, Utc};

/// A started but not yet completed authorization attempt.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub session_id: String,
    /// CSRF nonce sent to Google as `state`
    pub state: String,
    pub created_at: DateTime<Utc>,
}
