// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use splatserve_jobs::{
    FfmpegExtractor, FrameExtractor, PipelineConfig, PipelineDriver, RetentionSweeper,
    StatusBroadcaster,
};

use crate::config::ServerConfig;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Job records and their live observers.
    pub jobs: StatusBroadcaster,
    /// Accepts submissions and runs each job in the background.
    pub pipeline: PipelineDriver,
}

impl AppState {
    /// Create the state for `config`, extracting frames with ffmpeg.
    pub fn new(config: &ServerConfig) -> Arc<Self> {
        let extractor = FfmpegExtractor::new(config.extractor_config());
        Self::with_extractor(config.pipeline_config(), Arc::new(extractor))
    }

    /// Create with a caller-supplied extractor (for testing).
    pub fn with_extractor(
        pipeline: PipelineConfig,
        extractor: Arc<dyn FrameExtractor>,
    ) -> Arc<Self> {
        let jobs = StatusBroadcaster::new();
        let pipeline = PipelineDriver::new(jobs.clone(), extractor, pipeline);
        Arc::new(Self {
            start_time: Instant::now(),
            jobs,
            pipeline,
        })
    }

    /// Sweeper over this state's job records.
    pub fn sweeper(&self, config: &ServerConfig) -> RetentionSweeper {
        RetentionSweeper::new(&self.jobs, config.retention(), config.sweep_interval())
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
