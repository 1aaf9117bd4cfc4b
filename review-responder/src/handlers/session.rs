use axum::{
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts},
};
use std::convert::Infallible;

use crate::error::ServerError;
use crate::services::session_store::short;
use crate::AppState;

/// The verified session id from the request's session cookie, if any.
///
/// Unsigned, tampered or foreign cookies are treated as no session at all.
#[derive(Debug, Clone)]
pub struct Session(pub Option<String>);

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session_id = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| state.session_keys.session_from_cookies(header));
        Ok(Session(session_id))
    }
}

/// A verified session, required by routes that act on the user's Google tokens.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession(pub String);

impl FromRequestParts<AppState> for AuthenticatedSession {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Session(session_id) = match Session::from_request_parts(parts, state).await {
            Ok(session) => session,
            Err(never) => match never {},
        };
        let session_id = session_id.ok_or_else(|| {
            ServerError::Unauthenticated("No valid session cookie".to_string())
        })?;
        tracing::debug!(session = %short(&session_id), "Session resolved");
        Ok(AuthenticatedSession(session_id))
    }
}
