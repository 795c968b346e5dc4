//! Whisper-style transcription client.
//!
//! POSTs one chunk's encoded audio as multipart form data and parses the
//! `verbose_json` response into [`Segment`]s.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tracing::debug;

use super::{Segment, TranscriptionService};
use crate::config::TranscriptionConfig;
use crate::error::TranscriptionError;

/// Maximum length of an error body kept in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 300;

pub struct WhisperClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl WhisperClient {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let api_key = config
            .resolve_api_key()
            .ok_or(TranscriptionError::MissingApiKey)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct VerboseResponse {
    #[serde(default)]
    segments: Vec<ApiSegment>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSegment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
}

/// Parses a `verbose_json` transcription body into ordered segments.
/// Falls back to a single zero-timed segment when the service returned
/// plain text without segment timing.
pub(crate) fn parse_verbose_json(body: &str) -> Result<Vec<Segment>, TranscriptionError> {
    let response: VerboseResponse = serde_json::from_str(body)?;

    let mut segments: Vec<Segment> = response
        .segments
        .into_iter()
        .map(|s| Segment {
            text: s.text.trim().to_string(),
            start: s.start,
            end: s.end,
        })
        .filter(|s| !s.text.is_empty())
        .collect();

    if segments.is_empty() {
        if let Some(text) = response.text {
            let text = text.trim();
            if !text.is_empty() {
                segments.push(Segment {
                    text: text.to_string(),
                    start: 0.0,
                    end: 0.0,
                });
            }
        }
    }

    if segments.is_empty() {
        return Err(TranscriptionError::NoSpeech);
    }
    Ok(segments)
}

fn truncate_body(body: String) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let cut: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", cut)
    } else {
        body
    }
}

#[async_trait]
impl TranscriptionService for WhisperClient {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> Result<Vec<Segment>, TranscriptionError> {
        let bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| TranscriptionError::ReadAudio {
                path: audio_path.to_path_buf(),
                source: e,
            })?;

        debug!(
            "transcribing {} ({} bytes)",
            audio_path.display(),
            bytes.len()
        );

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());
        let file_part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("language", language.to_string())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", file_part);

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(TranscriptionError::Auth);
        }
        if status.as_u16() == 429 {
            return Err(TranscriptionError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Service {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let body = response.text().await?;
        parse_verbose_json(&body)
    }
}
