// crates/jobs/src/extractor.rs
//! Frame extraction: the external encoder seam and its ffmpeg implementation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex_lite::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ExtractError;

/// File name pattern handed to the encoder, relative to the output workspace.
pub const FRAME_PATTERN: &str = "frame_%04d.jpg";

/// How much trailing diagnostic text is kept for error reports.
const DIAGNOSTIC_TAIL_BYTES: usize = 4096;

/// Longest single diagnostic line kept while waiting for its terminator.
const MAX_LINE_BYTES: usize = 8192;

static FRAME_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"frame=\s*(\d+)").expect("valid frame marker regex"));

/// Turns a video into still frames inside an output directory.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Extract frames from `input` into `output_dir`, calling `progress` with
    /// an estimated percentage (0-100) as the extraction advances.
    async fn extract(
        &self,
        input: &Path,
        output_dir: &Path,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<(), ExtractError>;
}

/// Settings for [`FfmpegExtractor`].
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub program: PathBuf,
    /// Output frames per second of video.
    pub frame_rate: u32,
    /// JPEG quality scale passed as `-q:v` (1 is best).
    pub quality: u32,
    /// Heuristic upper bound used to turn frame counters into a percentage.
    pub assumed_total_frames: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            frame_rate: 2,
            quality: 1,
            assumed_total_frames: 500,
        }
    }
}

/// Runs `ffmpeg` and estimates progress from the `frame=` counters it writes
/// to stderr.
#[derive(Debug, Clone, Default)]
pub struct FfmpegExtractor {
    config: ExtractorConfig,
}

impl FfmpegExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn command(&self, input: &Path, output_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("-i")
            .arg(input)
            .arg("-r")
            .arg(self.config.frame_rate.to_string())
            .arg("-q:v")
            .arg(self.config.quality.to_string())
            .arg("-f")
            .arg("image2")
            .arg(output_dir.join(FRAME_PATTERN))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract(
        &self,
        input: &Path,
        output_dir: &Path,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<(), ExtractError> {
        info!(
            program = %self.config.program.display(),
            input = %input.display(),
            output_dir = %output_dir.display(),
            frame_rate = self.config.frame_rate,
            "starting frame extraction"
        );

        let mut child = self
            .command(input, output_dir)
            .spawn()
            .map_err(|source| ExtractError::Spawn {
                program: self.config.program.display().to_string(),
                source,
            })?;

        let mut tail = DiagnosticTail::new(DIAGNOSTIC_TAIL_BYTES);
        if let Some(mut stderr) = child.stderr.take() {
            let mut scanner = ProgressScanner::new(self.config.assumed_total_frames);
            let mut buf = [0u8; 4096];
            loop {
                let n = stderr.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                tail.push(&buf[..n]);
                for percent in scanner.feed(&buf[..n]) {
                    progress(percent);
                }
            }
            if let Some(percent) = scanner.finish() {
                progress(percent);
            }
        }

        let status = child.wait().await?;
        if status.success() {
            debug!(input = %input.display(), "frame extraction finished");
            Ok(())
        } else {
            warn!(
                input = %input.display(),
                code = ?status.code(),
                "frame extractor failed"
            );
            Err(ExtractError::Exited {
                code: status.code(),
                diagnostics: tail.into_string(),
            })
        }
    }
}

/// The frame counter of the last `frame=` marker in `line`.
pub fn parse_frame_marker(line: &str) -> Option<u64> {
    FRAME_MARKER
        .captures_iter(line)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `frame / assumed_total` as a rounded percentage, capped at 100.
pub fn frame_percent(frame: u64, assumed_total: u64) -> u8 {
    if assumed_total == 0 {
        return 100;
    }
    let percent = frame as f64 / assumed_total as f64 * 100.0;
    percent.min(100.0).round() as u8
}

/// Splits a byte stream into `\n`- or `\r`-terminated segments and reports
/// the percentage of each one that carries a frame marker.
#[derive(Debug)]
struct ProgressScanner {
    assumed_total: u64,
    line: Vec<u8>,
}

impl ProgressScanner {
    fn new(assumed_total: u64) -> Self {
        Self {
            assumed_total,
            line: Vec::new(),
        }
    }

    fn feed(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut found = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if let Some(percent) = self.take_line() {
                    found.push(percent);
                }
            } else if self.line.len() < MAX_LINE_BYTES {
                self.line.push(byte);
            }
        }
        found
    }

    fn finish(&mut self) -> Option<u8> {
        self.take_line()
    }

    fn take_line(&mut self) -> Option<u8> {
        if self.line.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        parse_frame_marker(&line).map(|frame| frame_percent(frame, self.assumed_total))
    }
}

/// Keeps the last `cap` bytes written to it.
#[derive(Debug)]
struct DiagnosticTail {
    cap: usize,
    bytes: Vec<u8>,
}

impl DiagnosticTail {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            bytes: Vec::new(),
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > self.cap {
            let excess = self.bytes.len() - self.cap;
            self.bytes.drain(..excess);
        }
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.bytes).trim().to_string()
    }
}

/// Number of regular files in `dir`.
pub async fn count_frames(dir: &Path) -> std::io::Result<u64> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
