mod auth;
mod callback;
mod logout;
mod reply;
mod reviews;
mod session;

pub use auth::start_authorization;
pub use callback::oauth_callback;
pub use logout::logout;
pub use reply::draft_reply;
pub use reviews::{pending_replies, process_new_reviews};
pub use session::{AuthenticatedSession, Session};

use axum::{
    error_handling::HandleErrorLayer,
    http::StatusCode,
    routing::{get, post},
    BoxError, Json, Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::models::HealthResponse;
use crate::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

pub async fn root() -> &'static str {
    "Review responder is live"
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_middleware_error(err: BoxError) -> (StatusCode, Json<Value>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request timed out");
        return (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({ "error": "Request timed out" })),
        );
    }

    tracing::error!(error = %err, "Unhandled middleware error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
}

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/auth", get(start_authorization))
        .route("/oauth/callback", get(oauth_callback))
        .route("/gmb/reply", post(draft_reply))
        .route("/gmb/process-new", get(process_new_reviews))
        .route("/gmb/pending-replies", get(pending_replies))
        .route("/logout", get(logout))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
