//! End-to-end tests for the HTTP API: submission, status polling and listing
//! against a pipeline driven by a scripted extractor.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::ServiceExt;

use common::{wait_for_terminal, ScriptedExtractor, TestServer};

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn submit(server: &TestServer, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/process")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(server.app(), request).await
}

async fn status_of(server: &TestServer, job_id: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(format!("/api/status/{job_id}"))
        .body(Body::empty())
        .unwrap();
    send(server.app(), request).await
}

#[tokio::test]
async fn test_submit_then_status_reports_initial_state() {
    let gate = Arc::new(Notify::new());
    let server = TestServer::start(ScriptedExtractor::gated(2, gate.clone())).await;

    let (status, body) = submit(
        &server,
        json!({ "filePath": server.input_path(), "fileName": "v.mp4" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "Processing started");
    let job_id = body["jobId"].as_str().unwrap().to_string();
    assert_eq!(job_id.len(), 36);
    assert_eq!(job_id.matches('-').count(), 4);

    let (status, record) = status_of(&server, &job_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["jobId"], job_id.as_str());
    assert_eq!(record["status"], "processing");
    assert_eq!(record["progress"], 0);
    assert_eq!(record["fileName"], "v.mp4");
    // The extractor is held at the gate, so the job cannot be past extraction.
    let stage = record["stage"].as_str().unwrap();
    assert!(
        stage == "initializing" || stage == "extracting_frames",
        "unexpected stage {stage}"
    );
    assert!(record.get("completedAt").is_none());
    assert!(record.get("error").is_none());
    assert!(chrono::DateTime::parse_from_rfc3339(record["createdAt"].as_str().unwrap()).is_ok());

    gate.notify_one();
}

#[tokio::test]
async fn test_job_runs_to_ready() {
    let server = TestServer::start(ScriptedExtractor::instant(3)).await;

    let (status, body) = submit(
        &server,
        json!({ "filePath": server.input_path(), "jobId": "job-ready" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["jobId"], "job-ready");

    wait_for_terminal(&server.state, "job-ready").await;

    let (status, record) = status_of(&server, "job-ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["status"], "completed");
    assert_eq!(record["stage"], "ready");
    assert_eq!(record["progress"], 100);
    assert_eq!(record["framesCount"], 3);
    assert!(record["completedAt"].is_string());
    let frames_dir = server.frames.path().join("job-ready");
    assert_eq!(record["framesDir"], frames_dir.display().to_string());
    assert_eq!(record["outputDir"], frames_dir.display().to_string());
    assert!(frames_dir.join("frame_0001.jpg").is_file());
}

#[tokio::test]
async fn test_failed_extraction_is_reported_and_cleaned_up() {
    let server = TestServer::start(ScriptedExtractor::failing()).await;

    let (status, _) = submit(
        &server,
        json!({ "filePath": server.input_path(), "jobId": "job-bad" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let record = wait_for_terminal(&server.state, "job-bad").await;
    assert_eq!(record.stage.as_str(), "error");
    assert_eq!(record.progress, 0);
    let message = record.error.unwrap();
    assert!(message.contains("moov atom not found"), "{message}");

    common::wait_until(|| !server.frames.path().join("job-bad").exists()).await;
}

#[tokio::test]
async fn test_missing_file_creates_no_job() {
    let server = TestServer::start(ScriptedExtractor::instant(1)).await;

    let (status, body) = submit(
        &server,
        json!({ "filePath": "/tmp/not-a-real-video.mp4", "fileName": "v.mp4" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid file path");

    let request = Request::builder()
        .uri("/api/jobs")
        .body(Body::empty())
        .unwrap();
    let (status, jobs) = send(server.app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs, json!([]));
}

#[tokio::test]
async fn test_duplicate_job_id_is_conflict() {
    let gate = Arc::new(Notify::new());
    let server = TestServer::start(ScriptedExtractor::gated(1, gate.clone())).await;
    let body = json!({ "filePath": server.input_path(), "jobId": "1718000000000" });

    let (status, _) = submit(&server, body.clone()).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, error) = submit(&server, body).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "Conflict");

    gate.notify_one();
}

#[tokio::test]
async fn test_invalid_job_id_is_bad_request() {
    let server = TestServer::start(ScriptedExtractor::instant(1)).await;
    let (status, body) = submit(
        &server,
        json!({ "filePath": server.input_path(), "jobId": "../../etc" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad request");
    assert!(server.state.jobs.list().is_empty());
}

#[tokio::test]
async fn test_list_jobs_includes_every_submission() {
    let server = TestServer::start(ScriptedExtractor::instant(1)).await;
    for id in ["job-a", "job-b"] {
        let (status, _) = submit(
            &server,
            json!({ "filePath": server.input_path(), "jobId": id }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    let request = Request::builder()
        .uri("/api/jobs")
        .body(Body::empty())
        .unwrap();
    let (status, jobs) = send(server.app(), request).await;
    assert_eq!(status, StatusCode::OK);

    let mut ids: Vec<_> = jobs
        .as_array()
        .unwrap()
        .iter()
        .map(|job| job["jobId"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["job-a", "job-b"]);
}
