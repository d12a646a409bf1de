// crates/jobs/src/pipeline.rs
//! Pipeline driver: accepts jobs and walks each one through its stages in
//! the background.
//!
//! Stage order: initializing → extracting_frames → frames_extracted →
//! colmap_optimization → gaussian_splatting → ready, with `error` reachable
//! from any stage. Every transition goes through the [`StatusBroadcaster`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::broadcaster::StatusBroadcaster;
use crate::error::{PipelineError, SubmitError, TransitionError};
use crate::extractor::{count_frames, FrameExtractor};
use crate::ramp::ProgressRamp;
use crate::types::{Stage, StatusPatch};

/// Longest caller-supplied job id accepted. Ids name directories on disk.
const MAX_JOB_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parent directory of every job's frame workspace.
    pub frames_root: PathBuf,
    pub colmap: ProgressRamp,
    pub splatting: ProgressRamp,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frames_root: PathBuf::from("extracted_frames"),
            colmap: ProgressRamp::colmap(),
            splatting: ProgressRamp::gaussian_splatting(),
        }
    }
}

/// A request to process one video.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub file_path: PathBuf,
    /// Display name; defaults to the input's file name.
    pub file_name: Option<String>,
    /// Caller-chosen id; a uuid is generated when absent.
    pub job_id: Option<String>,
}

/// Acknowledgement of an accepted job. The pipeline is already running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: String,
}

/// Accepts jobs and runs one background task per job.
#[derive(Clone)]
pub struct PipelineDriver {
    broadcaster: StatusBroadcaster,
    extractor: Arc<dyn FrameExtractor>,
    config: Arc<PipelineConfig>,
}

impl PipelineDriver {
    pub fn new(
        broadcaster: StatusBroadcaster,
        extractor: Arc<dyn FrameExtractor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            broadcaster,
            extractor,
            config: Arc::new(config),
        }
    }

    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.broadcaster
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate `request`, create the job's record and workspace, and start
    /// the pipeline in the background.
    ///
    /// Returns as soon as the job is recorded; it never waits on the pipeline.
    /// On error nothing was recorded and nothing was started.
    pub async fn submit(&self, request: SubmitRequest) -> Result<Submission, SubmitError> {
        let SubmitRequest {
            file_path,
            file_name,
            job_id,
        } = request;

        validate_input(&file_path).await?;

        let job_id = match job_id {
            Some(id) => {
                validate_job_id(&id)?;
                if self.broadcaster.registry().contains(&id) {
                    return Err(SubmitError::Conflict(id));
                }
                id
            }
            None => Uuid::new_v4().to_string(),
        };

        let file_name = file_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                file_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            });

        let output_dir = self.config.frames_root.join(&job_id);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| SubmitError::Workspace {
                path: output_dir.clone(),
                source,
            })?;

        let initial = StatusPatch::created(
            file_name,
            output_dir.display().to_string(),
            Utc::now(),
        );
        match self.broadcaster.create(&job_id, initial) {
            Ok(_) => {}
            Err(TransitionError::AlreadyExists) => return Err(SubmitError::Conflict(job_id)),
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to record new job");
                return Err(SubmitError::Conflict(job_id));
            }
        }

        info!(
            job_id = %job_id,
            input = %file_path.display(),
            output_dir = %output_dir.display(),
            "job accepted"
        );

        self.spawn(job_id.clone(), file_path, output_dir);
        Ok(Submission { job_id })
    }

    fn spawn(&self, job_id: String, input: PathBuf, output_dir: PathBuf) {
        let driver = self.clone();
        tokio::spawn(async move {
            let worker = {
                let driver = driver.clone();
                let job_id = job_id.clone();
                let output_dir = output_dir.clone();
                tokio::spawn(async move { driver.execute(&job_id, &input, &output_dir).await })
            };

            let outcome = match worker.await {
                Ok(result) => result,
                Err(join_err) if join_err.is_panic() => Err(PipelineError::Panicked),
                // Aborted at runtime shutdown; nothing left to report to.
                Err(_) => return,
            };

            match outcome {
                Ok(()) => info!(job_id = %job_id, "job completed"),
                Err(e) => driver.fail(&job_id, &output_dir, &e).await,
            }
        });
    }

    async fn execute(
        &self,
        job_id: &str,
        input: &Path,
        output_dir: &Path,
    ) -> Result<(), PipelineError> {
        info!(job_id = %job_id, input = %input.display(), "extracting frames");
        self.report(job_id, StatusPatch::stage(Stage::ExtractingFrames));

        let broadcaster = self.broadcaster.clone();
        let progress_job = job_id.to_string();
        let on_progress = move |percent: u8| {
            let _ = broadcaster.update(&progress_job, StatusPatch::progress(percent));
        };
        self.extractor
            .extract(input, output_dir, &on_progress)
            .await?;

        let frames = count_frames(output_dir)
            .await
            .map_err(PipelineError::Frames)?;
        info!(job_id = %job_id, frames, "frames extracted");
        self.report(
            job_id,
            StatusPatch::frames_extracted(frames, output_dir.display().to_string()),
        );

        self.run_ramp(job_id, Stage::ColmapOptimization, self.config.colmap)
            .await;
        self.run_ramp(job_id, Stage::GaussianSplatting, self.config.splatting)
            .await;

        self.report(job_id, StatusPatch::completed(Utc::now()));
        Ok(())
    }

    async fn run_ramp(&self, job_id: &str, stage: Stage, ramp: ProgressRamp) {
        info!(
            job_id = %job_id,
            stage = %stage,
            steps = ramp.steps,
            duration_secs = ramp.duration().as_secs_f64(),
            "stage started"
        );
        self.report(job_id, StatusPatch::stage(stage));
        ramp.run(|progress| self.report(job_id, StatusPatch::progress(progress)))
            .await;
        info!(job_id = %job_id, stage = %stage, "stage finished");
    }

    /// Record a failure and clean up the workspace, best-effort.
    async fn fail(&self, job_id: &str, output_dir: &Path, e: &PipelineError) {
        error!(job_id = %job_id, error = %e, "job failed");
        self.report(job_id, StatusPatch::failed(e.to_string()));

        match tokio::fs::remove_dir_all(output_dir).await {
            Ok(()) => info!(job_id = %job_id, output_dir = %output_dir.display(), "removed job workspace"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                job_id = %job_id,
                output_dir = %output_dir.display(),
                error = %err,
                "failed to remove job workspace"
            ),
        }
    }

    fn report(&self, job_id: &str, patch: StatusPatch) {
        // Rejections are logged by the broadcaster.
        let _ = self.broadcaster.update(job_id, patch);
    }
}

async fn validate_input(path: &Path) -> Result<(), SubmitError> {
    let invalid = || SubmitError::InvalidFilePath {
        path: path.display().to_string(),
    };
    if path.as_os_str().is_empty() {
        return Err(invalid());
    }
    let metadata = tokio::fs::metadata(path).await.map_err(|_| invalid())?;
    if !metadata.is_file() {
        return Err(invalid());
    }
    // Readability: opening is the only reliable check.
    tokio::fs::File::open(path).await.map_err(|_| invalid())?;
    Ok(())
}

fn validate_job_id(id: &str) -> Result<(), SubmitError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_JOB_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SubmitError::InvalidJobId(id.to_string()))
    }
}
