//! Directory HTTP server.
//!
//! Exposes one shared [`Directory`] as a JSON API, so a browser front end
//! can drive the search box, filter dropdowns and pager without holding
//! any pagination state of its own.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/directory` | Current page view |
//! | `GET`  | `/directory/facets` | Facet values computed at startup |
//! | `POST` | `/directory/search` | `{ "text": "..." }`, starts a search session |
//! | `POST` | `/directory/filter` | `{ "attribute": "...", "value": "..." }`, sets or clears one filter |
//! | `POST` | `/directory/clear` | Clears all filters |
//! | `POST` | `/directory/next` | Next page |
//! | `POST` | `/directory/previous` | Previous page |
//!
//! Every `POST` answers with the resulting view. A navigation that was
//! ignored (previous on page 1, next on the last page) still answers `200`
//! with `"ignored": "<reason>"` and the unchanged view.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "upstream_error", "message": "remote returned HTTP 503 ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `upstream_error` (502). A failed
//! fetch never changes the displayed page.
//!
//! # Concurrency
//!
//! The directory sits behind a `tokio::sync::Mutex`, so overlapping
//! requests are applied one at a time in arrival order.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients. Requests are traced at `debug` via `tower_http::trace`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use graph_directory_core::{
    Directory, DirectoryError, DirectoryView, FacetSet, Navigation, PageSource,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;

/// A directory shared across request handlers.
pub type SharedDirectory = Arc<Mutex<Directory<dyn PageSource>>>;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    directory: SharedDirectory,
}

/// Initialize `directory` and serve it on `[server].bind`.
///
/// A failed first page is logged and served as an error view; the
/// server still starts so clients can retry with a new query.
pub async fn run_server(
    config: &Config,
    mut directory: Directory<dyn PageSource>,
) -> anyhow::Result<()> {
    if let Err(e) = directory.init().await {
        warn!("initial directory load failed: {}", e);
    }
    let app = router(Arc::new(Mutex::new(directory)));

    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("directory server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router over an already-initialized directory.
pub fn router(directory: SharedDirectory) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/directory", get(handle_view))
        .route("/directory/facets", get(handle_facets))
        .route("/directory/search", post(handle_search))
        .route("/directory/filter", post(handle_filter))
        .route("/directory/clear", post(handle_clear))
        .route("/directory/next", post(handle_next))
        .route("/directory/previous", post(handle_previous))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { directory })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"upstream_error"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error".to_string(),
        message: message.into(),
    }
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::UnknownAttribute(_) => bad_request(err.to_string()),
            DirectoryError::Transport(e) => upstream_error(e.to_string()),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Views ============

/// Response body for every directory endpoint that returns a page.
#[derive(Serialize)]
struct ViewResponse {
    #[serde(flatten)]
    view: DirectoryView,
    /// Set when a navigation request was ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    ignored: Option<&'static str>,
}

impl ViewResponse {
    fn of(directory: &Directory<dyn PageSource>, navigation: Option<Navigation>) -> Json<Self> {
        let ignored = match navigation {
            Some(Navigation::Ignored(reason)) => Some(reason.as_str()),
            _ => None,
        };
        Json(Self {
            view: directory.view(),
            ignored,
        })
    }
}

async fn handle_view(State(state): State<AppState>) -> Json<ViewResponse> {
    let directory = state.directory.lock().await;
    ViewResponse::of(&directory, None)
}

#[derive(Serialize)]
struct FacetsResponse {
    facets: Vec<FacetSet>,
}

async fn handle_facets(State(state): State<AppState>) -> Json<FacetsResponse> {
    let directory = state.directory.lock().await;
    Json(FacetsResponse {
        facets: directory.facets().to_vec(),
    })
}

// ============ Query changes ============

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    text: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<ViewResponse>, AppError> {
    let mut directory = state.directory.lock().await;
    directory.search(&req.text).await?;
    Ok(ViewResponse::of(&directory, None))
}

#[derive(Deserialize)]
struct FilterRequest {
    attribute: String,
    /// Absent, `null` or `""` deselects the attribute.
    #[serde(default)]
    value: Option<String>,
}

async fn handle_filter(
    State(state): State<AppState>,
    Json(req): Json<FilterRequest>,
) -> Result<Json<ViewResponse>, AppError> {
    let mut directory = state.directory.lock().await;
    directory
        .set_filter_by_name(&req.attribute, req.value)
        .await?;
    Ok(ViewResponse::of(&directory, None))
}

async fn handle_clear(State(state): State<AppState>) -> Result<Json<ViewResponse>, AppError> {
    let mut directory = state.directory.lock().await;
    directory.clear_filters().await?;
    Ok(ViewResponse::of(&directory, None))
}

// ============ Navigation ============

async fn handle_next(State(state): State<AppState>) -> Result<Json<ViewResponse>, AppError> {
    let mut directory = state.directory.lock().await;
    let navigation = directory.next().await?;
    Ok(ViewResponse::of(&directory, Some(navigation)))
}

async fn handle_previous(State(state): State<AppState>) -> Result<Json<ViewResponse>, AppError> {
    let mut directory = state.directory.lock().await;
    let navigation = directory.previous().await?;
    Ok(ViewResponse::of(&directory, Some(navigation)))
}
