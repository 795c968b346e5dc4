use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory where normalized audio and chunk artifacts are written.
    pub media_directory: String,
    /// SQLite database file. Defaults to `~/.lingodeck/data/lingodeck.db`.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub explanation: ExplanationConfig,
    #[serde(default)]
    pub assembly: AssemblyConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_media_extensions")]
    pub supported_extensions: Vec<String>,
}

fn default_worker_count() -> usize {
    num_cpus::get().min(4)
}

fn default_database_path() -> String {
    dirs::home_dir()
        .map(|h| {
            h.join(".lingodeck")
                .join("data")
                .join("lingodeck.db")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "lingodeck.db".to_string())
}

fn default_media_extensions() -> Vec<String> {
    ["mkv", "mp4", "avi", "webm", "mov", "mp3", "wav", "m4a", "flac"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    pub fn is_supported_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.supported_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&extension))
    }
}

/// Settings for the external media normalization tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FfmpegConfig {
    #[serde(default = "default_ffmpeg_binary")]
    pub binary: String,
    #[serde(default = "default_ffprobe_binary")]
    pub probe_binary: String,
    /// Target sample rate for normalized audio (Hz).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Bitrate of the normalized audio artifact (kbit/s).
    #[serde(default = "default_bitrate")]
    pub bitrate_kbps: u32,
    #[serde(default = "default_ffmpeg_timeout")]
    pub timeout_secs: u64,
}

fn default_ffmpeg_binary() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_binary() -> String {
    "ffprobe".to_string()
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_bitrate() -> u32 {
    128
}

fn default_ffmpeg_timeout() -> u64 {
    600
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: default_ffmpeg_binary(),
            probe_binary: default_ffprobe_binary(),
            sample_rate: default_sample_rate(),
            bitrate_kbps: default_bitrate(),
            timeout_secs: default_ffmpeg_timeout(),
        }
    }
}

/// Settings for the external speech-to-text service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Direct API key value. Falls back to `api_key_env` when empty.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_transcription_model")]
    pub model: String,
    /// ISO language code of the recording (e.g. "nl").
    #[serde(default = "default_language")]
    pub language: String,
    /// Size ceiling for one chunk's encoded artifact, in bytes.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: u64,
    /// Bitrate chunks are re-encoded at before upload (kbit/s).
    #[serde(default = "default_chunk_bitrate")]
    pub chunk_bitrate_kbps: u32,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_language() -> String {
    "nl".to_string()
}

fn default_max_chunk_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_chunk_bitrate() -> u32 {
    64
}

fn default_http_timeout() -> u64 {
    120
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            model: default_transcription_model(),
            language: default_language(),
            max_chunk_bytes: default_max_chunk_bytes(),
            chunk_bitrate_kbps: default_chunk_bitrate(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl TranscriptionConfig {
    /// Resolves the API key: direct value first, then the named env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref(), &self.api_key_env)
    }
}

/// Settings for the external annotation (LLM) service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_explanation_model")]
    pub model: String,
    /// Sentences annotated per service call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between consecutive batches, for service rate limits.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Language the learner already speaks (explanations, meanings).
    #[serde(default = "default_native_language")]
    pub native_language: String,
    /// Language being studied (the recording's language).
    #[serde(default = "default_study_language")]
    pub study_language: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_explanation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_delay_ms() -> u64 {
    500
}

fn default_native_language() -> String {
    "English".to_string()
}

fn default_study_language() -> String {
    "Dutch".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            model: default_explanation_model(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            native_language: default_native_language(),
            study_language: default_study_language(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl ExplanationConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref(), &self.api_key_env)
    }
}

fn resolve_api_key(direct: Option<&str>, env_var: &str) -> Option<String> {
    if let Some(key) = direct {
        if !key.trim().is_empty() {
            return Some(key.to_string());
        }
    }
    std::env::var(env_var).ok().filter(|k| !k.trim().is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Hard cap on words merged into one sentence.
    #[serde(default = "default_max_sentence_words")]
    pub max_sentence_words: usize,
}

fn default_max_sentence_words() -> usize {
    100
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_sentence_words: default_max_sentence_words(),
        }
    }
}

/// Bounded backoff applied to every external call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before retry N is `delays_secs[N-1]`; the last entry repeats.
    #[serde(default = "default_retry_delays")]
    pub delays_secs: Vec<u64>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delays() -> Vec<u64> {
    vec![1, 5, 15]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delays_secs: default_retry_delays(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_directory: "media".to_string(),
            database_path: default_database_path(),
            worker_count: default_worker_count(),
            ffmpeg: FfmpegConfig::default(),
            transcription: TranscriptionConfig::default(),
            explanation: ExplanationConfig::default(),
            assembly: AssemblyConfig::default(),
            retry: RetryConfig::default(),
            supported_extensions: default_media_extensions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_constants() {
        let config = Config::default();
        assert_eq!(config.ffmpeg.sample_rate, 16_000);
        assert_eq!(config.ffmpeg.bitrate_kbps, 128);
        assert_eq!(config.transcription.chunk_bitrate_kbps, 64);
        assert_eq!(config.explanation.batch_size, 5);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delays_secs, vec![1, 5, 15]);
    }

    #[test]
    fn test_supported_extension_is_case_insensitive() {
        let config = Config::default();
        assert!(config.is_supported_extension("MP4"));
        assert!(config.is_supported_extension("mp3"));
        assert!(!config.is_supported_extension("pdf"));
    }

    #[test]
    fn test_api_key_direct_value_wins() {
        let resolved = resolve_api_key(Some("sk-direct"), "LINGODECK_TEST_KEY_UNSET");
        assert_eq!(resolved.as_deref(), Some("sk-direct"));
    }

    #[test]
    fn test_api_key_env_fallback() {
        std::env::set_var("LINGODECK_TEST_KEY_SET", "sk-from-env");
        let resolved = resolve_api_key(None, "LINGODECK_TEST_KEY_SET");
        assert_eq!(resolved.as_deref(), Some("sk-from-env"));
        std::env::remove_var("LINGODECK_TEST_KEY_SET");
    }

    #[test]
    fn test_api_key_empty_values_are_ignored() {
        let resolved = resolve_api_key(Some("   "), "LINGODECK_TEST_KEY_UNSET");
        assert!(resolved.is_none());
    }
}
