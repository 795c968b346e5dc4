//! Progress model and progress reporting seam.
//!
//! [`progress_percent`] is a pure function of already-committed job fields,
//! so it can be evaluated at any time, concurrently with an in-flight
//! stage, without locking.

use super::stage::Stage;

/// Maps a job's committed state to a 0-100 percentage.
///
/// Each stage owns a base percentage; within `explaining` the value
/// interpolates between 50 and 95, reserving the last 5 points for the
/// terminal commit to `ready`.
pub fn progress_percent(stage: Stage, total_sentences: u32, explained_sentences: u32) -> u8 {
    match stage {
        Stage::Pending | Stage::Error => 0,
        Stage::Extracting => 10,
        Stage::Transcribing => 30,
        Stage::Explaining => {
            if total_sentences == 0 {
                return 50;
            }
            let fraction = explained_sentences as f64 / total_sentences as f64;
            let value = 50 + (fraction * 45.0) as u32;
            value.min(95) as u8
        }
        Stage::Ready => 100,
    }
}

/// Events emitted by the pipeline while a job runs.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Stage {
        stage: Stage,
        message: String,
    },
    ChunkTranscribed {
        index: u32,
        total: u32,
    },
    BatchExplained {
        explained: u32,
        total: u32,
    },
    Completed,
    Failed {
        stage: Stage,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and fire-and-forget callers.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}
