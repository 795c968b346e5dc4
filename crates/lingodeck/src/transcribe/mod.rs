//! Speech-to-text service integration.
//!
//! A [`TranscriptionService`] takes one chunk's audio artifact and returns
//! time-aligned segments with chunk-relative timestamps. The orchestrator
//! remaps them to absolute recording time with [`Segment::offset_by`]
//! before anything is persisted.

pub mod whisper;

use std::path::Path;

use async_trait::async_trait;

use crate::error::TranscriptionError;

pub use whisper::WhisperClient;

/// A raw time-stamped text fragment from the transcription service.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Segment {
    /// Shifts both timestamps by `delta` seconds, turning chunk-relative
    /// times into absolute recording times.
    pub fn offset_by(self, delta: f64) -> Self {
        Self {
            text: self.text,
            start: self.start + delta,
            end: self.end + delta,
        }
    }
}

#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Transcribes one chunk artifact. Returned segments are ordered and
    /// carry chunk-relative timestamps.
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> Result<Vec<Segment>, TranscriptionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_by_remaps_to_absolute_time() {
        let segment = Segment {
            text: "hallo".to_string(),
            start: 2.0,
            end: 4.5,
        };
        let absolute = segment.offset_by(30.0);
        assert_eq!(absolute.start, 32.0);
        assert_eq!(absolute.end, 34.5);
        assert_eq!(absolute.text, "hallo");
    }

    #[test]
    fn test_offset_by_zero_is_identity() {
        let segment = Segment {
            text: "eerste".to_string(),
            start: 0.0,
            end: 1.0,
        };
        assert_eq!(segment.clone().offset_by(0.0), segment);
    }
}
