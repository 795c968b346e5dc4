//! Media normalization via an external ffmpeg process.
//!
//! Converts arbitrary input media into the compact mono stream the
//! transcription service expects, probes durations, and slices chunk
//! artifacts. Everything goes through the [`MediaService`] trait so the
//! pipeline can be driven without the real tool in tests.

pub mod chunker;

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::config::FfmpegConfig;
use crate::error::ExtractionError;

pub use chunker::{estimated_bytes, plan_chunks, ChunkSpan};

#[async_trait]
pub trait MediaService: Send + Sync {
    /// Produces the normalized audio artifact for `input` at `output`,
    /// overwriting any previous partial output.
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), ExtractionError>;

    /// Returns the duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, ExtractionError>;

    /// Re-encodes `[start, start + duration)` of the normalized audio into
    /// a smaller chunk artifact at `output`.
    async fn slice(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: f64,
    ) -> Result<(), ExtractionError>;
}

/// Production media service shelling out to ffmpeg/ffprobe.
pub struct FfmpegNormalizer {
    binary: String,
    probe_binary: String,
    sample_rate: u32,
    bitrate_kbps: u32,
    chunk_bitrate_kbps: u32,
    timeout: Duration,
}

impl FfmpegNormalizer {
    pub fn new(config: &FfmpegConfig, chunk_bitrate_kbps: u32) -> Self {
        Self {
            binary: config.binary.clone(),
            probe_binary: config.probe_binary.clone(),
            sample_rate: config.sample_rate,
            bitrate_kbps: config.bitrate_kbps,
            chunk_bitrate_kbps,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Checks that the ffmpeg binary is present and runs.
    pub async fn verify(&self) -> Result<(), ExtractionError> {
        let output = self.run(&self.binary, &["-version".to_string()]).await?;
        debug!(
            "{} available: {}",
            self.binary,
            output.lines().next().unwrap_or_default()
        );
        Ok(())
    }

    fn encode_args(
        &self,
        input: &Path,
        output: &Path,
        span: Option<(f64, f64)>,
        bitrate_kbps: u32,
    ) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-i".to_string(), input.display().to_string()];
        if let Some((start, duration)) = span {
            args.push("-ss".to_string());
            args.push(format!("{:.3}", start));
            args.push("-t".to_string());
            args.push(format!("{:.3}", duration));
        }
        args.extend([
            "-vn".to_string(),
            "-acodec".to_string(),
            "libmp3lame".to_string(),
            "-ab".to_string(),
            format!("{}k", bitrate_kbps),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            output.display().to_string(),
        ]);
        args
    }

    /// Runs a tool to completion under the configured timeout and returns
    /// its stdout. Non-zero exit or a missing binary is an error.
    async fn run(&self, binary: &str, args: &[String]) -> Result<String, ExtractionError> {
        debug!("running {} {}", binary, args.join(" "));

        let result = timeout(self.timeout, Command::new(binary).args(args).output()).await;

        let output = match result {
            Err(_) => {
                return Err(ExtractionError::Timeout {
                    seconds: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(ExtractionError::ToolMissing {
                    binary: binary.to_string(),
                })
            }
            Ok(Err(e)) => {
                return Err(ExtractionError::Spawn {
                    binary: binary.to_string(),
                    source: e,
                })
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr
                .lines()
                .last()
                .unwrap_or_default()
                .chars()
                .take(500)
                .collect();
            return Err(ExtractionError::CommandFailed {
                binary: binary.to_string(),
                code: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        span: Option<(f64, f64)>,
        bitrate_kbps: u32,
    ) -> Result<(), ExtractionError> {
        if !input.exists() {
            return Err(ExtractionError::InputMissing(input.to_path_buf()));
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ExtractionError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let args = self.encode_args(input, output, span, bitrate_kbps);
        self.run(&self.binary, &args).await?;

        if !output.exists() {
            return Err(ExtractionError::OutputMissing(output.to_path_buf()));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaService for FfmpegNormalizer {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), ExtractionError> {
        self.encode(input, output, None, self.bitrate_kbps).await
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, ExtractionError> {
        if !path.exists() {
            return Err(ExtractionError::InputMissing(path.to_path_buf()));
        }

        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.display().to_string(),
        ];
        let stdout = self.run(&self.probe_binary, &args).await?;

        stdout
            .trim()
            .parse::<f64>()
            .map_err(|_| ExtractionError::InvalidDuration(stdout.trim().to_string()))
    }

    async fn slice(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: f64,
    ) -> Result<(), ExtractionError> {
        self.encode(input, output, Some((start, duration)), self.chunk_bitrate_kbps)
            .await
    }
}
