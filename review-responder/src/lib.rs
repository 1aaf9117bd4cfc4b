pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod testing;

pub use config::Configuration;
pub use error::ServerError;

use services::{AuthorizationFlow, GbpTarget, ReviewReplyGateway, SessionKeys, TokenStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub authorization: Arc<AuthorizationFlow>,
    pub tokens: Arc<TokenStore>,
    pub gateway: Arc<ReviewReplyGateway>,
    pub session_keys: Arc<SessionKeys>,
    pub target: GbpTarget,
}
