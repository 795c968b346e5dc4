use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::db::job_repo::JobRow;
use crate::db::{Database, DatabaseError};
use crate::pipeline::{progress_percent, Stage};

/// Cooperative stop signal for one running job. The pipeline checks it
/// after each committed unit and before starting the next; an in-flight
/// external call is never aborted.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A request to process one recording.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: String,
    pub name: String,
    pub source_path: PathBuf,
    /// MIME type of the source file (e.g. "video/mp4", "audio/mpeg").
    pub media_type: Option<String>,
}

impl JobRequest {
    /// Creates a request for a new recording, generating the job id and
    /// deriving the display name and media type from the path.
    pub fn new(source_path: PathBuf) -> Self {
        let name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "recording".to_string());
        let media_type = detect_media_type(&source_path);
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            name,
            source_path,
            media_type,
        }
    }

    /// Creates a request for an existing job id (operator resubmission).
    pub fn with_id(job_id: String, source_path: PathBuf) -> Self {
        let mut request = Self::new(source_path);
        request.job_id = job_id;
        request
    }

    pub fn extension(&self) -> Option<String> {
        self.source_path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// Detects MIME type from file path using the mime_guess crate.
/// Returns `None` for unknown extensions.
fn detect_media_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.to_string())
}

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct JobResult {
    pub job_id: String,
    pub success: bool,
    pub cancelled: bool,
    /// Stage the job ended in: `ready`, `error`, or where it was stopped.
    pub stage: Stage,
    pub error: Option<String>,
}

impl JobResult {
    pub fn success(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            success: true,
            cancelled: false,
            stage: Stage::Ready,
            error: None,
        }
    }

    pub fn cancelled(job_id: &str, stage: Stage) -> Self {
        Self {
            job_id: job_id.to_string(),
            success: false,
            cancelled: true,
            stage,
            error: None,
        }
    }

    pub fn failure(job_id: &str, stage: Stage, error: String) -> Self {
        Self {
            job_id: job_id.to_string(),
            success: false,
            cancelled: false,
            stage,
            error: Some(error),
        }
    }
}

/// The status view exposed to presentation layers: the committed
/// four-tuple plus the derived percentage and description.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub job_id: String,
    pub name: String,
    pub stage: Stage,
    pub progress: u8,
    pub total_sentences: u32,
    pub explained_sentences: u32,
    pub error: Option<String>,
    pub description: String,
}

impl JobStatus {
    pub fn from_row(row: &JobRow) -> Self {
        let stage = Stage::parse(&row.stage).unwrap_or(Stage::Pending);
        let description = match stage {
            Stage::Explaining => format!(
                "Generating explanations ({}/{})...",
                row.explained_sentences, row.total_sentences
            ),
            Stage::Error => format!(
                "Error: {}",
                row.error.as_deref().unwrap_or("Unknown error")
            ),
            other => other.description().to_string(),
        };
        Self {
            job_id: row.id.clone(),
            name: row.name.clone(),
            stage,
            progress: progress_percent(stage, row.total_sentences, row.explained_sentences),
            total_sentences: row.total_sentences,
            explained_sentences: row.explained_sentences,
            error: row.error.clone(),
            description,
        }
    }

    /// Reads a job's status at any time; side-effect free.
    pub fn fetch(db: &Database, job_id: &str) -> Result<Option<JobStatus>, DatabaseError> {
        Ok(crate::db::job_repo::find_by_id(db, job_id)?
            .as_ref()
            .map(Self::from_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job_repo;

    #[test]
    fn test_cancel_flag_starts_clear() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());

        // Clones observe the same flag.
        let clone = flag.clone();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_request_derives_name_and_media_type() {
        let request = JobRequest::new(PathBuf::from("/uploads/Les 3.mp4"));
        assert!(!request.job_id.is_empty());
        assert_eq!(request.name, "Les 3.mp4");
        assert_eq!(request.media_type.as_deref(), Some("video/mp4"));
        assert_eq!(request.extension().as_deref(), Some("mp4"));
    }

    #[test]
    fn test_request_media_type_for_audio_and_unknown() {
        let audio = JobRequest::new(PathBuf::from("radio.mp3"));
        assert_eq!(audio.media_type.as_deref(), Some("audio/mpeg"));

        let unknown = JobRequest::new(PathBuf::from("weird.xyz123"));
        assert!(unknown.media_type.is_none());
    }

    #[test]
    fn test_request_with_id_keeps_the_id() {
        let request = JobRequest::with_id("job-7".to_string(), PathBuf::from("a.wav"));
        assert_eq!(request.job_id, "job-7");
        assert_eq!(request.name, "a.wav");
    }

    #[test]
    fn test_status_view_from_row() {
        let db = Database::open_in_memory().unwrap();
        let mut row = job_repo::JobRow {
            id: "s1".to_string(),
            name: "lesson.mp4".to_string(),
            source_path: "/tmp/lesson.mp4".to_string(),
            audio_path: Some("/media/s1.mp3".to_string()),
            media_type: None,
            stage: "explaining".to_string(),
            error: None,
            total_sentences: 10,
            explained_sentences: 5,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        };
        job_repo::insert(&db, &row).unwrap();

        let status = JobStatus::fetch(&db, "s1").unwrap().unwrap();
        assert_eq!(status.stage, Stage::Explaining);
        assert_eq!(status.progress, 72);
        assert!(status.description.contains("5/10"));

        row.stage = "ready".to_string();
        let status = JobStatus::from_row(&row);
        assert_eq!(status.progress, 100);
        assert_eq!(status.description, "Processing complete");
    }

    #[test]
    fn test_status_fetch_missing_job() {
        let db = Database::open_in_memory().unwrap();
        assert!(JobStatus::fetch(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_error_status_includes_detail() {
        let row = job_repo::JobRow {
            id: "e1".to_string(),
            name: "x.mp4".to_string(),
            source_path: "/tmp/x.mp4".to_string(),
            audio_path: None,
            media_type: None,
            stage: "error".to_string(),
            error: Some("transcribing: rate limit exceeded".to_string()),
            total_sentences: 0,
            explained_sentences: 0,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let status = JobStatus::from_row(&row);
        assert_eq!(status.stage, Stage::Error);
        assert_eq!(status.progress, 0);
        assert!(status.description.contains("rate limit"));
    }
}
