use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Redirect, Response},
};

use super::Session;
use crate::{error::ServerError, AppState};

/// Redirect to Google's consent screen, creating the session cookie on first visit.
pub async fn start_authorization(
    State(state): State<AppState>,
    Session(session_id): Session,
) -> Result<Response, ServerError> {
    let (session_id, new_cookie) = match session_id {
        Some(session_id) => (session_id, None),
        None => {
            let (session_id, value) = state.session_keys.issue();
            (session_id, Some(state.session_keys.set_cookie(&value)))
        }
    };

    let url = state.authorization.begin_authorization(&session_id)?;
    let redirect = Redirect::to(&url);

    Ok(match new_cookie {
        Some(cookie) => ([(SET_COOKIE, cookie)], redirect).into_response(),
        None => redirect.into_response(),
    })
}
