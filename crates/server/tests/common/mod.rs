//! Shared fixtures for the server integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use splatserve_jobs::{
    ExtractError, FrameExtractor, JobStatus, PipelineConfig, ProgressRamp,
};
use splatserve_server::{create_app, AppState};
use tokio::sync::Notify;

/// In-memory stand-in for ffmpeg: writes `frames` files, optionally waits
/// for the gate to open, reports progress, then succeeds or fails.
pub struct ScriptedExtractor {
    pub frames: usize,
    pub gate: Option<Arc<Notify>>,
    pub fail: bool,
}

impl ScriptedExtractor {
    pub fn instant(frames: usize) -> Self {
        Self {
            frames,
            gate: None,
            fail: false,
        }
    }

    pub fn gated(frames: usize, gate: Arc<Notify>) -> Self {
        Self {
            frames,
            gate: Some(gate),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            frames: 1,
            gate: None,
            fail: true,
        }
    }
}

#[async_trait]
impl FrameExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        _input: &Path,
        output_dir: &Path,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<(), ExtractError> {
        for i in 1..=self.frames {
            tokio::fs::write(output_dir.join(format!("frame_{i:04}.jpg")), b"jpg").await?;
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        progress(50);
        progress(100);
        if self.fail {
            return Err(ExtractError::Exited {
                code: Some(1),
                diagnostics: "moov atom not found".into(),
            });
        }
        Ok(())
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub frames: tempfile::TempDir,
    pub input: tempfile::NamedTempFile,
}

impl TestServer {
    /// Serve a fresh app on an ephemeral port with fast stage ticks.
    pub async fn start(extractor: ScriptedExtractor) -> Self {
        let frames = tempfile::tempdir().unwrap();
        let input = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        let tick = Duration::from_millis(2);
        let state = AppState::with_extractor(
            PipelineConfig {
                frames_root: frames.path().to_path_buf(),
                colmap: ProgressRamp::colmap().with_tick(tick),
                splatting: ProgressRamp::gaussian_splatting().with_tick(tick),
            },
            Arc::new(extractor),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            frames,
            input,
        }
    }

    pub fn app(&self) -> axum::Router {
        create_app(self.state.clone())
    }

    pub fn ws_url(&self, path_and_query: &str) -> String {
        format!("ws://{}{}", self.addr, path_and_query)
    }

    pub fn input_path(&self) -> String {
        self.input.path().display().to_string()
    }
}

/// Poll `check` until it holds or five seconds pass.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Wait until `job_id` reaches a terminal status and return its record.
pub async fn wait_for_terminal(state: &AppState, job_id: &str) -> JobStatus {
    wait_until(|| {
        state
            .jobs
            .get(job_id)
            .is_some_and(|status| status.status.is_terminal())
    })
    .await;
    state.jobs.get(job_id).unwrap()
}
