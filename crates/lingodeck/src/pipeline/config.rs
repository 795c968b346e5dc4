use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;

/// The subset of configuration the pipeline runner needs, resolved into
/// ready-to-use types.
pub struct PipelineConfig {
    /// Directory for normalized audio and chunk artifacts.
    pub media_directory: PathBuf,
    /// ISO language code passed to the transcription service.
    pub language: String,
    /// Size ceiling for one chunk's encoded artifact.
    pub max_chunk_bytes: u64,
    /// Bitrate chunk artifacts are encoded at.
    pub chunk_bitrate_kbps: u32,
    /// Sentences per explanation batch.
    pub batch_size: usize,
    /// Pause between consecutive explanation batches.
    pub batch_delay: Duration,
    /// Word cap per assembled sentence.
    pub max_sentence_words: usize,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            media_directory: PathBuf::from(&config.media_directory),
            language: config.transcription.language.clone(),
            max_chunk_bytes: config.transcription.max_chunk_bytes,
            chunk_bitrate_kbps: config.transcription.chunk_bitrate_kbps,
            batch_size: config.explanation.batch_size.max(1),
            batch_delay: Duration::from_millis(config.explanation.batch_delay_ms),
            max_sentence_words: config.assembly.max_sentence_words,
        }
    }
}
