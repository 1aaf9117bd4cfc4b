use gbp_api::endpoints::accounts::Account;
use serde::{Deserialize, Serialize};

use super::Review;

// GET /oauth/callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub access_token_expires_in: i64,
    pub accounts: Vec<AccountSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub id: String,
    pub name: Option<String>,
}

impl From<Account> for AccountSummary {
    fn from(account: Account) -> Self {
        Self {
            id: account.id().to_string(),
            name: account.account_name,
        }
    }
}

// POST /gmb/reply
#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub review: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub reply: String,
}

// GET /gmb/pending-replies
#[derive(Debug, Serialize)]
pub struct PendingRepliesResponse {
    pub pending: Vec<Review>,
}

// GET /logout
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

// Health check
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
