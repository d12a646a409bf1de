// crates/jobs/src/lib.rs
//! Job tracking and the video-to-splat processing pipeline.
//!
//! Provides:
//! - `JobRegistry`: in-memory record of every job, keyed by id
//! - `ObserverDirectory`: at most one live subscriber per job
//! - `StatusBroadcaster`: records updates and pushes them to observers
//! - `PipelineDriver`: accepts jobs and runs their stages in the background
//! - `RetentionSweeper`: periodic removal of old records

pub mod broadcaster;
pub mod error;
pub mod extractor;
pub mod observers;
pub mod pipeline;
pub mod ramp;
pub mod registry;
pub mod sweeper;
pub mod types;

pub use broadcaster::{StatusBroadcaster, Subscription};
pub use error::{ExtractError, PipelineError, SubmitError, TransitionError};
pub use extractor::{ExtractorConfig, FfmpegExtractor, FrameExtractor};
pub use observers::{ObserverDirectory, ObserverId, ObserverInfo};
pub use pipeline::{PipelineConfig, PipelineDriver, SubmitRequest, Submission};
pub use ramp::ProgressRamp;
pub use registry::JobRegistry;
pub use sweeper::RetentionSweeper;
pub use types::{JobStatus, Stage, Status, StatusPatch};
