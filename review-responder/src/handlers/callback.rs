use axum::{
    extract::{Query, State},
    Json,
};

use super::Session;
use crate::{
    error::ServerError,
    models::{AccountSummary, CallbackParams, CallbackResponse},
    services::session_store::short,
    AppState,
};

pub async fn oauth_callback(
    State(state): State<AppState>,
    Session(session_id): Session,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>, ServerError> {
    let session_id = session_id.ok_or_else(|| {
        tracing::warn!("OAuth callback without a valid session cookie");
        ServerError::StateMismatch
    })?;

    let tokens = state
        .authorization
        .complete_authorization(&session_id, params)
        .await?;
    let access_token_expires_in = tokens.expires_in();
    state.tokens.store(&session_id, tokens).await;

    // Tokens are stored at this point, so a listing failure only empties the account list
    let accounts = match state.gateway.list_accounts(&session_id).await {
        Ok(accounts) => accounts.into_iter().map(AccountSummary::from).collect(),
        Err(err) => {
            tracing::warn!(session = %short(&session_id), error = %err, "Failed to list accounts");
            Vec::new()
        }
    };

    tracing::info!(
        session = %short(&session_id),
        accounts = accounts.len(),
        "OAuth callback successful"
    );

    Ok(Json(CallbackResponse {
        access_token_expires_in,
        accounts,
    }))
}
