use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState, SharedState};
use super::auth::AuthGate;
use super::fetch_loop::FetchLoop;
use crate::config::ServerConfig;
use crate::fetcher::Fetcher;
use crate::gitlab::GitLabFetcher;

/// Build the application router: pull endpoint, watch socket and health check.
pub fn build_router(state: SharedState, cors: bool) -> Router {
    let mut app = api::api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Serve on `listener` until `shutdown` resolves.
///
/// The fetch loop runs for as long as the server does.
pub async fn serve<F>(
    listener: TcpListener,
    state: SharedState,
    fetch_loop: FetchLoop,
    cors: bool,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let fetch_task = fetch_loop.spawn();
    let hub = state.hub.clone();
    let app = build_router(state, cors);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error");

    fetch_task.abort();
    // Upgraded sockets outlive the listener; end them explicitly.
    let closed = hub.close_all();
    tracing::debug!(watchers = closed, "closed watch sockets");
    result
}

/// Validate `config`, wire up the GitLab fetcher and serve until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let auth = AuthGate::from_config(&config.auth).context("Invalid auth configuration")?;
    if !auth.is_enabled() {
        tracing::warn!("no JWT secret configured, project details are public");
    }

    let fetcher: Arc<dyn Fetcher> = Arc::new(
        GitLabFetcher::new(
            config.gitlab.base_url.as_deref().unwrap_or_default(),
            config.gitlab.token.as_deref().unwrap_or_default(),
            &config.gitlab.api_path,
        )
        .context("Failed to build GitLab client")?,
    );

    let state = Arc::new(AppState::new(auth));
    let fetch_loop = FetchLoop::new(
        fetcher,
        state.store.clone(),
        state.hub.clone(),
        config.poll_interval,
    );

    let addr = normalize_bind_address(&config.bind_address);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        poll_interval = ?config.poll_interval,
        version = api::VERSION,
        "cistatus server listening"
    );

    serve(listener, state, fetch_loop, config.cors, shutdown_signal()).await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

/// Accept Go-style `:80` as shorthand for all interfaces.
fn normalize_bind_address(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received Ctrl+C, shutting down");
}
