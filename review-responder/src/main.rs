use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use review_responder::{
    config::Configuration,
    handlers,
    services::{
        AuthorizationFlow, GbpReviewsApi, GbpTarget, OAuthClient, OpenAiDrafter,
        ReviewReplyGateway, SessionKeys, SessionStore, TokenStore,
    },
    AppState,
};

const SESSION_COOKIE_MAX_AGE_SECONDS: u64 = 7 * 24 * 60 * 60;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();

    let configuration = Configuration::new().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded successfully");

    // Initialize services
    let provider = Arc::new(OAuthClient::new(&configuration.oauth)?);
    let tokens = TokenStore::with_max_age(SESSION_COOKIE_MAX_AGE_SECONDS);
    let authorization = Arc::new(AuthorizationFlow::new(
        provider.clone(),
        SessionStore::new(configuration.server.session_ttl_seconds),
    ));
    let gateway = Arc::new(ReviewReplyGateway::new(
        tokens.clone(),
        provider,
        Arc::new(GbpReviewsApi::new(Duration::from_secs(
            configuration.gbp.timeout_seconds,
        ))),
        Arc::new(OpenAiDrafter::new(&configuration.llm)?),
        configuration.gbp.concurrency,
    ));
    let secure_cookies = configuration.oauth.redirect_uri.starts_with("https://");
    let session_keys = Arc::new(SessionKeys::new(
        configuration.server.session_secret.clone(),
        secure_cookies,
        SESSION_COOKIE_MAX_AGE_SECONDS,
    ));

    let app_state = AppState {
        authorization,
        tokens,
        gateway,
        session_keys,
        target: GbpTarget::from(&configuration.gbp),
    };

    let app = handlers::router(
        app_state,
        Duration::from_secs(configuration.server.request_timeout_seconds),
    );

    // Start server
    let addr = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
