use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use super::MAX_BODY_BYTES;
use crate::{
    error::ServerError,
    models::{ReplyRequest, ReplyResponse},
    AppState,
};

pub async fn draft_reply(
    State(state): State<AppState>,
    payload: Result<Json<ReplyRequest>, JsonRejection>,
) -> Result<Json<ReplyResponse>, ServerError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected reply request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(MAX_BODY_BYTES)
        } else {
            ServerError::MissingInput(
                "Request body must be JSON with a \"review\" field".to_string(),
            )
        }
    })?;

    let review = request
        .review
        .ok_or_else(|| ServerError::MissingInput("Review text is required".to_string()))?;

    let reply = state.gateway.draft_reply(&review).await?;
    Ok(Json(ReplyResponse { reply }))
}
