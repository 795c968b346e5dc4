use thiserror::Error;

use super::stage::Stage;
use crate::db::DatabaseError;
use crate::error::{AssemblyError, ExplanationError, ExtractionError, TranscriptionError};

/// A pipeline failure, carrying enough context to name the stage that
/// failed and the underlying cause.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Audio extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Chunk {index} encoding failed: {source}")]
    ChunkEncode {
        index: u32,
        #[source]
        source: ExtractionError,
    },

    #[error("Chunk {index} transcription failed: {source}")]
    Transcription {
        index: u32,
        #[source]
        source: TranscriptionError,
    },

    #[error("Sentence assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Explanation failed for batch starting at sentence {start}: {source}")]
    Explanation {
        start: u32,
        #[source]
        source: ExplanationError,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl PipelineError {
    /// The stage this failure is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::JobNotFound(_) => Stage::Pending,
            PipelineError::Extraction(_) => Stage::Extracting,
            PipelineError::ChunkEncode { .. } | PipelineError::Transcription { .. } => {
                Stage::Transcribing
            }
            PipelineError::Assembly(_) => Stage::Transcribing,
            PipelineError::Explanation { .. } => Stage::Explaining,
            PipelineError::Database(_) => Stage::Pending,
        }
    }

    /// The stage-qualified detail string persisted on the job.
    pub fn detail(&self) -> String {
        format!("{}: {}", self.stage(), self)
    }
}
