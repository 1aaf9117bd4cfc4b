use axum::{extract::State, http::header::SET_COOKIE, response::IntoResponse, Json};

use super::Session;
use crate::{models::LogoutResponse, services::session_store::short, AppState};

/// Forget the session's tokens and pending sign-in, and expire the cookie.
pub async fn logout(
    State(state): State<AppState>,
    Session(session_id): Session,
) -> impl IntoResponse {
    let message = match session_id {
        Some(session_id) => {
            state.authorization.abandon(&session_id);
            if state.tokens.clear(&session_id).await {
                tracing::info!(session = %short(&session_id), "Logged out");
                "Logged out"
            } else {
                "No tokens were stored for this session"
            }
        }
        None => "No active session",
    };

    (
        [(SET_COOKIE, state.session_keys.expire_cookie())],
        Json(LogoutResponse {
            message: message.to_string(),
        }),
    )
}
