// crates/server/src/config.rs
//! Command-line and environment configuration for the server binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use splatserve_jobs::{ExtractorConfig, PipelineConfig, ProgressRamp};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "splatserve")]
#[command(version)]
#[command(about = "Video to gaussian-splat processing service")]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3002)]
    pub port: u16,

    /// Parent directory for per-job frame workspaces
    #[arg(long, env = "FRAMES_OUTPUT_DIR", default_value = "extracted_frames")]
    pub frames_dir: PathBuf,

    /// Reconstruction output directory, created at startup
    #[arg(long, env = "COLMAP_OUTPUT_DIR", default_value = "colmap_output")]
    pub colmap_dir: PathBuf,

    /// Frame extractor executable
    #[arg(long = "ffmpeg", env = "FFMPEG_BIN", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Frames extracted per second of video
    #[arg(long, default_value_t = 2)]
    pub frame_rate: u32,

    /// Frame count treated as 100% when estimating extraction progress
    #[arg(long, default_value_t = 500)]
    pub assumed_total_frames: u64,

    /// How long job records are kept
    #[arg(long, default_value_t = 24)]
    pub retention_hours: u64,

    /// How often expired job records are swept
    #[arg(long, default_value_t = 120)]
    pub sweep_interval_minutes: u64,

    /// Tick length of the simulated reconstruction and training stages
    #[arg(long, default_value_t = 1000)]
    pub stage_tick_ms: u64,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            frames_dir: PathBuf::from("extracted_frames"),
            colmap_dir: PathBuf::from("colmap_output"),
            ffmpeg: PathBuf::from("ffmpeg"),
            frame_rate: 2,
            assumed_total_frames: 500,
            retention_hours: 24,
            sweep_interval_minutes: 120,
            stage_tick_ms: 1000,
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            program: self.ffmpeg.clone(),
            frame_rate: self.frame_rate,
            assumed_total_frames: self.assumed_total_frames,
            ..ExtractorConfig::default()
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let tick = Duration::from_millis(self.stage_tick_ms);
        PipelineConfig {
            frames_root: self.frames_dir.clone(),
            colmap: ProgressRamp::colmap().with_tick(tick),
            splatting: ProgressRamp::gaussian_splatting().with_tick(tick),
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(60 * 60))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_minutes.saturating_mul(60))
    }
}
