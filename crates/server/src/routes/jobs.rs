// crates/server/src/routes/jobs.rs
//! API routes for video processing jobs.
//!
//! - POST /process: Submit a video for processing
//! - GET /status/{job_id}: Current status of one job
//! - GET /jobs: Every tracked job

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use splatserve_jobs::{JobStatus, SubmitRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub job_id: String,
    pub message: String,
}

/// POST /api/process: Accept a video and start its pipeline.
///
/// Answers 202 as soon as the job is recorded; progress is reported through
/// the status endpoint and the WebSocket.
async fn process(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProcessResponse>)> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let file_path = request
        .file_path
        .filter(|path| !path.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidFilePath(String::new()))?;

    let submission = state
        .pipeline
        .submit(SubmitRequest {
            file_path: PathBuf::from(file_path),
            file_name: request.file_name,
            job_id: request.job_id,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessResponse {
            job_id: submission.job_id,
            message: "Processing started".to_string(),
        }),
    ))
}

/// GET /api/status/{job_id}: Current record for one job.
async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatus>> {
    state
        .jobs
        .get(&job_id)
        .map(Json)
        .ok_or(ApiError::JobNotFound(job_id))
}

/// GET /api/jobs: Every tracked job.
async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobStatus>> {
    Json(state.jobs.list())
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/process", post(process))
        .route("/status/{job_id}", get(job_status))
        .route("/jobs", get(list_jobs))
}
