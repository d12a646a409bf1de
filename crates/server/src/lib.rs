// crates/server/src/lib.rs
//! Splatserve server library.
//!
//! Axum HTTP and WebSocket surface over the job pipeline: submit a video,
//! poll or stream its progress through frame extraction, reconstruction and
//! splat training.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{LogFormat, ServerConfig};
pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, process, status, jobs) and the WebSocket endpoint
/// - CORS (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================
