pub mod authorization;
pub mod oauth_client;
pub mod reply_drafter;
pub mod review_gateway;
pub mod reviews_api;
pub mod session_keys;
pub mod session_store;
pub mod token_store;

pub use authorization::AuthorizationFlow;
pub use oauth_client::{OAuthClient, OAuthProvider};
pub use reply_drafter::{OpenAiDrafter, ReplyDrafter};
pub use review_gateway::{GbpTarget, ReviewReplyGateway};
pub use reviews_api::{ApiCallError, GbpReviewsApi, ReviewsApi};
pub use session_keys::SessionKeys;
pub use session_store::SessionStore;
pub use token_store::TokenStore;

use base64::Engine;
use rand::RngCore;

/// 256 bits from the thread-local CSPRNG, base64url encoded without padding.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
