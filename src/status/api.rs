use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

use super::auth::AuthGate;
use super::hub::Hub;
use super::state::SummaryStore;
use super::ws::{self, Keepalive};

pub const SERVER_NAME: &str = "cistatus";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub store: Arc<SummaryStore>,
    pub hub: Arc<Hub>,
    pub auth: AuthGate,
    pub keepalive: Keepalive,
}

impl AppState {
    pub fn new(auth: AuthGate) -> Self {
        let store = Arc::new(SummaryStore::new());
        let hub = Arc::new(Hub::new());
        // Watchers connecting before the first fetch still get a frame.
        hub.prime(&store.snapshot());
        Self {
            store,
            hub,
            auth,
            keepalive: Keepalive::default(),
        }
    }

    pub fn with_keepalive(mut self, keepalive: Keepalive) -> Self {
        self.keepalive = keepalive;
        self
    }
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api", get(get_summary))
        .route("/api/watch", get(ws::watch_handler))
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "ok"
}

/// Latest summary. Always 200; the project list is only included for
/// authorized callers.
async fn get_summary(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let mut summary = state.store.snapshot();
    if !state.auth.is_authorized(&headers) {
        summary.projects.clear();
    }

    let body = serde_json::to_vec(&summary).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/json; charset=utf-8"),
            (header::SERVER, SERVER_NAME),
            (HeaderName::from_static("x-server-version"), VERSION),
        ],
        body,
    ))
}
