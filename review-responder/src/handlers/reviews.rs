use axum::{extract::State, Json};

use super::AuthenticatedSession;
use crate::{
    error::ServerError,
    models::{PendingRepliesResponse, ProcessSummary},
    AppState,
};

pub async fn pending_replies(
    State(state): State<AppState>,
    AuthenticatedSession(session_id): AuthenticatedSession,
) -> Result<Json<PendingRepliesResponse>, ServerError> {
    let pending = state
        .gateway
        .list_pending_reviews(&session_id, &state.target)
        .await?;
    Ok(Json(PendingRepliesResponse { pending }))
}

pub async fn process_new_reviews(
    State(state): State<AppState>,
    AuthenticatedSession(session_id): AuthenticatedSession,
) -> Result<Json<ProcessSummary>, ServerError> {
    let summary = state
        .gateway
        .process_new_reviews(&session_id, &state.target)
        .await?;
    Ok(Json(summary))
}
