//! Axum router construction for the Observer API.
//!
//! Assembles all routes into a single [`Router`] with CORS middleware
//! enabled so browser dashboards on other origins can connect.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /api/route` -- loaded route topology
/// - `GET /api/stream` -- start a run, stream its events as SSE
/// - `POST /api/control` -- retune a live run
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/route", get(handlers::get_route))
        .route("/api/stream", get(handlers::stream))
        .route("/api/control", post(handlers::post_control))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
