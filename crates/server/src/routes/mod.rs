//! API route handlers for the splatserve server.

pub mod health;
pub mod jobs;
pub mod ws;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/process - Submit a video for processing
/// - GET  /api/status/{job_id} - Current status of one job
/// - GET  /api/jobs - Every tracked job
/// - GET  /ws?jobId= - WebSocket stream of one job's updates (also on `/`)
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router().merge(jobs::router()))
        .merge(ws::router())
        .with_state(state)
}
