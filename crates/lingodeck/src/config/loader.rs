use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.media_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "media_directory must not be empty".to_string(),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.ffmpeg.sample_rate == 0 || config.ffmpeg.bitrate_kbps == 0 {
        return Err(ConfigError::Validation {
            message: "ffmpeg sample_rate and bitrate_kbps must be non-zero".to_string(),
        });
    }

    if config.transcription.max_chunk_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "transcription.max_chunk_bytes must be non-zero".to_string(),
        });
    }

    if config.transcription.chunk_bitrate_kbps == 0 {
        return Err(ConfigError::Validation {
            message: "transcription.chunk_bitrate_kbps must be non-zero".to_string(),
        });
    }

    if config.transcription.language.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "transcription.language must not be empty".to_string(),
        });
    }

    if config.explanation.batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "explanation.batch_size must be at least 1".to_string(),
        });
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "retry.max_attempts must be at least 1".to_string(),
        });
    }

    if config.retry.delays_secs.is_empty() {
        return Err(ConfigError::Validation {
            message: "retry.delays_secs must not be empty".to_string(),
        });
    }

    if config.assembly.max_sentence_words == 0 {
        return Err(ConfigError::Validation {
            message: "assembly.max_sentence_words must be at least 1".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_applies_defaults() {
        let config = load_config_from_str(r#"{ "media_directory": "/var/lib/lingodeck" }"#)
            .expect("minimal config should load");

        assert_eq!(config.media_directory, "/var/lib/lingodeck");
        assert_eq!(config.transcription.model, "whisper-1");
        assert_eq!(config.transcription.language, "nl");
        assert_eq!(config.explanation.batch_size, 5);
        assert_eq!(config.retry.delays_secs, vec![1, 5, 15]);
        assert!(config.worker_count >= 1);
    }

    #[test]
    fn test_overrides_are_honored() {
        let config = load_config_from_str(
            r#"{
                "media_directory": "media",
                "worker_count": 2,
                "transcription": { "language": "de", "max_chunk_bytes": 1048576 },
                "explanation": { "batch_size": 3, "study_language": "German" },
                "retry": { "max_attempts": 2, "delays_secs": [2, 4] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.worker_count, 2);
        assert_eq!(config.transcription.language, "de");
        assert_eq!(config.transcription.max_chunk_bytes, 1_048_576);
        assert_eq!(config.explanation.batch_size, 3);
        assert_eq!(config.explanation.study_language, "German");
        assert_eq!(config.retry.max_attempts, 2);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let result = load_config_from_str(
            r#"{ "media_directory": "media", "explanation": { "batch_size": 0 } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_zero_retry_attempts_is_rejected() {
        let result = load_config_from_str(
            r#"{ "media_directory": "media", "retry": { "max_attempts": 0 } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_empty_media_directory_is_rejected() {
        let result = load_config_from_str(r#"{ "media_directory": "  " }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "media_directory": "media" }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.media_directory, "media");
    }

    #[test]
    fn test_missing_file_is_reported_with_path() {
        let result = load_config("/nonexistent/lingodeck/config.json");
        match result {
            Err(ConfigError::ReadFile { path, .. }) => {
                assert!(path.to_string_lossy().contains("config.json"));
            }
            other => panic!("expected ReadFile error, got {:?}", other.err()),
        }
    }
}
