// crates/jobs/src/types.rs
//! Job status record, stage ordering and partial updates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

/// Overall status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Processing,
    Completed,
    Failed,
}

impl Status {
    /// Completed and failed are final: the record accepts no further patches.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage. Declaration order is pipeline order, so the derived `Ord`
/// is the order stages must advance in. `Error` sorts last and can be entered
/// from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initializing,
    ExtractingFrames,
    FramesExtracted,
    ColmapOptimization,
    GaussianSplatting,
    Ready,
    Error,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initializing => "initializing",
            Stage::ExtractingFrames => "extracting_frames",
            Stage::FramesExtracted => "frames_extracted",
            Stage::ColmapOptimization => "colmap_optimization",
            Stage::GaussianSplatting => "gaussian_splatting",
            Stage::Ready => "ready",
            Stage::Error => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tracked state of one job. Serialized in the camelCase shape observers
/// and the status API expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: String,
    pub status: Status,
    pub stage: Stage,
    /// 0-100 within the current stage.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames_dir: Option<String>,
}

impl JobStatus {
    /// A bare record: processing, initializing, 0%.
    pub fn new(job_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            status: Status::Processing,
            stage: Stage::Initializing,
            progress: 0,
            file_name: None,
            output_dir: None,
            created_at,
            completed_at: None,
            error: None,
            frames_count: None,
            frames_dir: None,
        }
    }

    /// Merge `patch` over this record.
    ///
    /// Only the fields the patch names change. The patch is checked as a whole
    /// before anything is written, so a rejected patch leaves the record as it
    /// was.
    pub fn apply(&mut self, patch: &StatusPatch) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Terminal {
                status: self.status,
            });
        }

        let stage = patch.stage.unwrap_or(self.stage);
        if stage < self.stage {
            return Err(TransitionError::StageRegression {
                from: self.stage,
                to: stage,
            });
        }

        let progress = match patch.progress {
            Some(p) => p.min(100),
            None if stage != self.stage => 0,
            None => self.progress,
        };
        if stage == self.stage && progress < self.progress {
            return Err(TransitionError::ProgressRegression {
                stage,
                from: self.progress,
                to: progress,
            });
        }

        let status = patch.status.unwrap_or(self.status);
        if patch.completed_at.is_some() && status != Status::Completed {
            return Err(TransitionError::Inconsistent {
                field: "completedAt",
                status,
            });
        }
        if patch.error.is_some() && status != Status::Failed {
            return Err(TransitionError::Inconsistent {
                field: "error",
                status,
            });
        }

        check_set_once("fileName", &self.file_name, &patch.file_name)?;
        check_set_once("outputDir", &self.output_dir, &patch.output_dir)?;
        check_set_once("framesCount", &self.frames_count, &patch.frames_count)?;
        check_set_once("framesDir", &self.frames_dir, &patch.frames_dir)?;
        if matches!(patch.created_at, Some(at) if at != self.created_at) {
            return Err(TransitionError::Immutable { field: "createdAt" });
        }

        self.status = status;
        self.stage = stage;
        self.progress = progress;
        merge(&mut self.file_name, &patch.file_name);
        merge(&mut self.output_dir, &patch.output_dir);
        merge(&mut self.completed_at, &patch.completed_at);
        merge(&mut self.error, &patch.error);
        merge(&mut self.frames_count, &patch.frames_count);
        merge(&mut self.frames_dir, &patch.frames_dir);
        Ok(())
    }
}

fn check_set_once<T: PartialEq>(
    field: &'static str,
    current: &Option<T>,
    incoming: &Option<T>,
) -> Result<(), TransitionError> {
    match (current, incoming) {
        (Some(old), Some(new)) if old != new => Err(TransitionError::Immutable { field }),
        _ => Ok(()),
    }
}

fn merge<T: Clone>(slot: &mut Option<T>, incoming: &Option<T>) {
    if let Some(value) = incoming {
        *slot = Some(value.clone());
    }
}

/// A partial update to a [`JobStatus`]. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusPatch {
    pub status: Option<Status>,
    pub stage: Option<Stage>,
    pub progress: Option<u8>,
    pub file_name: Option<String>,
    pub output_dir: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub frames_count: Option<u64>,
    pub frames_dir: Option<String>,
}

impl StatusPatch {
    /// The record a job starts with on submission.
    pub fn created(
        file_name: Option<String>,
        output_dir: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: Some(Status::Processing),
            stage: Some(Stage::Initializing),
            progress: Some(0),
            file_name,
            output_dir: Some(output_dir.into()),
            created_at: Some(created_at),
            ..Self::default()
        }
    }

    /// Enter `stage` at 0%.
    pub fn stage(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            progress: Some(0),
            ..Self::default()
        }
    }

    /// Progress within the current stage.
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Extraction finished: `count` frames were written to `frames_dir`.
    pub fn frames_extracted(count: u64, frames_dir: impl Into<String>) -> Self {
        Self {
            stage: Some(Stage::FramesExtracted),
            progress: Some(100),
            frames_count: Some(count),
            frames_dir: Some(frames_dir.into()),
            ..Self::default()
        }
    }

    pub fn completed(at: DateTime<Utc>) -> Self {
        Self {
            status: Some(Status::Completed),
            stage: Some(Stage::Ready),
            progress: Some(100),
            completed_at: Some(at),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(Status::Failed),
            stage: Some(Stage::Error),
            progress: Some(0),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}
