use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LingodeckError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Transcription error: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("Explanation error: {0}")]
    Explanation(#[from] ExplanationError),

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Failures of the media normalization tool (ffmpeg/ffprobe).
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Input file not found: {0}")]
    InputMissing(PathBuf),

    #[error("Media tool '{binary}' not found in PATH")]
    ToolMissing { binary: String },

    #[error("Failed to run '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{binary}' exited with code {code:?}: {stderr}")]
    CommandFailed {
        binary: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Media tool timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Tool completed but output file not found: {0}")]
    OutputMissing(PathBuf),

    #[error("Could not determine media duration: {0}")]
    InvalidDuration(String),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the external speech-to-text service, per chunk.
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Transcription API key not configured")]
    MissingApiKey,

    #[error("Failed to read audio file '{path}': {source}")]
    ReadAudio {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcription request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Transcription service rejected credentials")]
    Auth,

    #[error("Transcription service rate limit exceeded")]
    RateLimited,

    #[error("Transcription service error (HTTP {status}): {body}")]
    Service { status: u16, body: String },

    #[error("Failed to parse transcription response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No speech detected in audio")]
    NoSpeech,
}

/// Failures of the external annotation service, per batch.
#[derive(Error, Debug)]
pub enum ExplanationError {
    #[error("Explanation API key not configured")]
    MissingApiKey,

    #[error("Explanation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Explanation service rejected credentials")]
    Auth,

    #[error("Explanation service rate limit exceeded")]
    RateLimited,

    #[error("Explanation service error (HTTP {status}): {body}")]
    Service { status: u16, body: String },

    #[error("Failed to parse explanation response as JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Explanation response is empty")]
    EmptyResponse,

    #[error("Explanation count mismatch: requested {expected}, received {got}")]
    CountMismatch { expected: usize, got: usize },
}

/// Deterministic assembly failures. Never retried: the input is
/// already-committed transcript data, so a retry cannot change the outcome.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Transcript contains no usable segments")]
    EmptyTranscript,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Unsupported media type for '{path}' (extension '{extension}')")]
    UnsupportedMedia { path: PathBuf, extension: String },

    #[error("Source file not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Failed to persist job: {0}")]
    Persist(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, LingodeckError>;
