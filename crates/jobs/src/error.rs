// crates/jobs/src/error.rs
//! Error types for the job subsystem.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Stage, Status};

/// A status patch that would break the record's invariants. The record is
/// left unchanged when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("job is already {status}")]
    Terminal { status: Status },

    #[error("stage cannot move back from {from} to {to}")]
    StageRegression { from: Stage, to: Stage },

    #[error("progress in {stage} cannot drop from {from} to {to}")]
    ProgressRegression { stage: Stage, from: u8, to: u8 },

    #[error("{field} is already set")]
    Immutable { field: &'static str },

    #[error("{field} cannot be set while the job is {status}")]
    Inconsistent { field: &'static str, status: Status },

    #[error("job already exists")]
    AlreadyExists,
}

/// Rejections raised synchronously by `PipelineDriver::submit`. When one of
/// these is returned no job record exists and no background work started.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid file path: {path}")]
    InvalidFilePath { path: String },

    #[error("invalid job id: {0}")]
    InvalidJobId(String),

    #[error("job {0} already exists")]
    Conflict(String),

    #[error("failed to create output workspace {}: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures of the external frame extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to start frame extractor `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("frame extractor exited with {}: {diagnostics}", exit_label(.code))]
    Exited {
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("frame extractor i/o error: {0}")]
    Io(#[from] io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

/// Anything that ends a background pipeline run early.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("failed to read extracted frames: {0}")]
    Frames(#[source] io::Error),

    #[error("pipeline worker panicked")]
    Panicked,
}
