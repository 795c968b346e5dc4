//! Job progress broadcasting for real-time status streaming.
//!
//! The pipeline reports [`ProgressEvent`]s through the
//! [`BroadcastProgress`] reporter, which turns them into serializable
//! [`JobProgressEvent`]s on a `tokio::sync::broadcast` channel for SSE or
//! websocket consumers.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::pipeline::progress::{ProgressEvent, ProgressReporter};
use crate::pipeline::{progress_percent, Stage};

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    /// Unique job identifier.
    pub job_id: String,
    /// Display name of the recording being processed.
    pub name: String,
    /// Current stage of the state machine.
    pub stage: Stage,
    /// Progress percentage derived from committed fields.
    pub progress: u8,
    /// Human-readable message describing current activity.
    pub message: String,
    /// Timestamp of this event.
    pub timestamp: DateTime<Utc>,
    pub total_sentences: u32,
    pub explained_sentences: u32,
    /// Error detail (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Broadcasts job progress events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Gets the inner sender for creating reporters.
    pub fn sender(&self) -> Arc<broadcast::Sender<JobProgressEvent>> {
        Arc::clone(&self.sender)
    }

    /// Creates the per-job progress reporter handed to the pipeline.
    pub fn start_job(&self, job_id: &str, name: &str) -> BroadcastProgress {
        BroadcastProgress::new(job_id, name, Arc::clone(&self.sender))
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[derive(Clone, Copy)]
struct Counters {
    stage: Stage,
    total: u32,
    explained: u32,
}

/// Bridges pipeline progress events to the broadcast channel for one job.
pub struct BroadcastProgress {
    job_id: String,
    name: String,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
    counters: Mutex<Counters>,
}

impl BroadcastProgress {
    pub fn new(
        job_id: &str,
        name: &str,
        sender: Arc<broadcast::Sender<JobProgressEvent>>,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            name: name.to_string(),
            sender,
            counters: Mutex::new(Counters {
                stage: Stage::Pending,
                total: 0,
                explained: 0,
            }),
        }
    }

    fn emit(&self, counters: Counters, message: String, error: Option<String>) {
        let event = JobProgressEvent {
            job_id: self.job_id.clone(),
            name: self.name.clone(),
            stage: counters.stage,
            progress: progress_percent(counters.stage, counters.total, counters.explained),
            message,
            timestamp: Utc::now(),
            total_sentences: counters.total,
            explained_sentences: counters.explained,
            error,
        };
        let _ = self.sender.send(event);
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        let Ok(mut counters) = self.counters.lock() else {
            return;
        };

        match event {
            ProgressEvent::Stage { stage, message } => {
                counters.stage = stage;
                self.emit(*counters, message, None);
            }
            ProgressEvent::ChunkTranscribed { index, total } => {
                counters.stage = Stage::Transcribing;
                self.emit(
                    *counters,
                    format!("Transcribed chunk {}/{}", index + 1, total),
                    None,
                );
            }
            ProgressEvent::BatchExplained { explained, total } => {
                counters.stage = Stage::Explaining;
                counters.total = total;
                counters.explained = explained;
                self.emit(
                    *counters,
                    format!("Explained {}/{} sentences", explained, total),
                    None,
                );
            }
            ProgressEvent::Completed => {
                counters.stage = Stage::Ready;
                self.emit(*counters, "Processing complete".to_string(), None);
            }
            ProgressEvent::Failed { stage, error } => {
                counters.stage = Stage::Error;
                self.emit(
                    *counters,
                    format!("Processing failed in stage {}", stage),
                    Some(error),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcaster_send_receive() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        let reporter = broadcaster.start_job("job-1", "lesson.mp4");
        reporter.report(ProgressEvent::Stage {
            stage: Stage::Extracting,
            message: "Extracting audio...".to_string(),
        });

        let received = rx.try_recv().unwrap();
        assert_eq!(received.job_id, "job-1");
        assert_eq!(received.name, "lesson.mp4");
        assert_eq!(received.stage, Stage::Extracting);
        assert_eq!(received.progress, 10);
    }

    #[test]
    fn test_batch_events_interpolate_progress() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let reporter = broadcaster.start_job("job-2", "lesson.mp4");

        reporter.report(ProgressEvent::BatchExplained {
            explained: 5,
            total: 10,
        });

        let received = rx.try_recv().unwrap();
        assert_eq!(received.stage, Stage::Explaining);
        assert_eq!(received.progress, 72);
        assert_eq!(received.explained_sentences, 5);
        assert_eq!(received.total_sentences, 10);
        assert!(received.message.contains("5/10"));
    }

    #[test]
    fn test_completed_event_reports_100() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let reporter = broadcaster.start_job("job-3", "lesson.mp4");

        reporter.report(ProgressEvent::Completed);

        let received = rx.try_recv().unwrap();
        assert_eq!(received.stage, Stage::Ready);
        assert_eq!(received.progress, 100);
    }

    #[test]
    fn test_failed_event_carries_error_detail() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let reporter = broadcaster.start_job("job-4", "lesson.mp4");

        reporter.report(ProgressEvent::Failed {
            stage: Stage::Transcribing,
            error: "transcribing: rate limit exceeded".to_string(),
        });

        let received = rx.try_recv().unwrap();
        assert_eq!(received.stage, Stage::Error);
        assert_eq!(received.progress, 0);
        assert!(received.error.unwrap().contains("rate limit"));
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        broadcaster
            .start_job("job-5", "lesson.mp4")
            .report(ProgressEvent::Stage {
                stage: Stage::Pending,
                message: "Queued".to_string(),
            });

        let json = serde_json::to_string(&rx.try_recv().unwrap()).unwrap();
        assert!(json.contains("\"jobId\":\"job-5\""));
        assert!(json.contains("\"totalSentences\":0"));
        assert!(json.contains("\"stage\":\"pending\""));
    }

    #[test]
    fn test_send_without_subscribers_does_not_fail() {
        let broadcaster = JobProgressBroadcaster::default();
        broadcaster
            .start_job("job-6", "lesson.mp4")
            .report(ProgressEvent::Completed);
    }
}
