//! Chunk repository: the resume checkpoint for the transcribing stage.
//!
//! Chunks and their transcribed segments live in separate tables but are
//! only ever written together: `commit_plan` records the chunk layout in
//! the same transaction that marks extraction complete, and
//! `commit_transcribed` flips a chunk's flag in the same transaction that
//! appends its segments.

use rusqlite::params;

use super::{Database, DatabaseError};
use crate::media::ChunkSpan;
use crate::transcribe::Segment;

/// A raw chunk row from the database.
#[derive(Debug, Clone)]
pub struct ChunkRow {
    pub job_id: String,
    pub idx: u32,
    pub start_offset: f64,
    pub end_offset: f64,
    pub transcribed: bool,
}

/// Commits the extraction result: stores the normalized audio path, the
/// planned chunk layout, and the transition to `transcribing` as one
/// durable update. Any chunks or segments from a previous attempt are
/// replaced.
pub fn commit_plan(
    db: &Database,
    job_id: &str,
    audio_path: &str,
    spans: &[ChunkSpan],
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_tx(|conn| {
        conn.execute("DELETE FROM segments WHERE job_id = ?1", params![job_id])?;
        conn.execute("DELETE FROM chunks WHERE job_id = ?1", params![job_id])?;

        let mut stmt = conn.prepare(
            "INSERT INTO chunks (job_id, idx, start_offset, end_offset, transcribed)
             VALUES (?1, ?2, ?3, ?4, 0)",
        )?;
        for span in spans {
            stmt.execute(params![job_id, span.index, span.start, span.end])?;
        }

        let updated = conn.execute(
            "UPDATE jobs SET audio_path = ?2, stage = 'transcribing', error = NULL,
             updated_at = ?3 WHERE id = ?1",
            params![job_id, audio_path, updated_at],
        )?;
        if updated != 1 {
            return Err(DatabaseError::Inconsistent(format!(
                "job {} not found while committing chunk plan",
                job_id
            )));
        }
        Ok(())
    })
}

/// Lists a job's chunks ordered by index.
pub fn list(db: &Database, job_id: &str) -> Result<Vec<ChunkRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT job_id, idx, start_offset, end_offset, transcribed
             FROM chunks WHERE job_id = ?1 ORDER BY idx",
        )?;
        let rows: Vec<ChunkRow> = stmt
            .query_map(params![job_id], |row| {
                Ok(ChunkRow {
                    job_id: row.get(0)?,
                    idx: row.get(1)?,
                    start_offset: row.get(2)?,
                    end_offset: row.get(3)?,
                    transcribed: row.get::<_, i64>(4)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Marks a chunk transcribed and appends its segments in one transaction,
/// so a reader never sees segments without the flag or vice versa.
/// Segment times must already be absolute recording time.
pub fn commit_transcribed(
    db: &Database,
    job_id: &str,
    chunk_idx: u32,
    segments: &[Segment],
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_tx(|conn| {
        let updated = conn.execute(
            "UPDATE chunks SET transcribed = 1 WHERE job_id = ?1 AND idx = ?2 AND transcribed = 0",
            params![job_id, chunk_idx],
        )?;
        if updated != 1 {
            return Err(DatabaseError::Inconsistent(format!(
                "chunk {}/{} already transcribed or missing",
                job_id, chunk_idx
            )));
        }

        let mut stmt = conn.prepare(
            "INSERT INTO segments (job_id, chunk_idx, seq, text, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (seq, segment) in segments.iter().enumerate() {
            stmt.execute(params![
                job_id,
                chunk_idx,
                seq as i64,
                segment.text,
                segment.start,
                segment.end,
            ])?;
        }

        conn.execute(
            "UPDATE jobs SET updated_at = ?2 WHERE id = ?1",
            params![job_id, updated_at],
        )?;
        Ok(())
    })
}

/// Lists all of a job's segments in recording order (chunk index, then
/// position within the chunk).
pub fn list_segments(db: &Database, job_id: &str) -> Result<Vec<Segment>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT text, start_time, end_time FROM segments
             WHERE job_id = ?1 ORDER BY chunk_idx, seq",
        )?;
        let rows: Vec<Segment> = stmt
            .query_map(params![job_id], |row| {
                Ok(Segment {
                    text: row.get(0)?,
                    start: row.get(1)?,
                    end: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job_repo;

    fn test_db_with_job(job_id: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        let job = job_repo::JobRow {
            id: job_id.to_string(),
            name: "lesson.mp4".to_string(),
            source_path: "/tmp/lesson.mp4".to_string(),
            audio_path: None,
            media_type: None,
            stage: "extracting".to_string(),
            error: None,
            total_sentences: 0,
            explained_sentences: 0,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        };
        job_repo::insert(&db, &job).unwrap();
        db
    }

    fn spans() -> Vec<ChunkSpan> {
        vec![
            ChunkSpan {
                index: 0,
                start: 0.0,
                end: 20.0,
            },
            ChunkSpan {
                index: 1,
                start: 20.0,
                end: 40.0,
            },
        ]
    }

    #[test]
    fn test_commit_plan_stores_chunks_and_advances_stage() {
        let db = test_db_with_job("j1");
        commit_plan(&db, "j1", "/media/j1.mp3", &spans(), "2026-01-01T00:01:00Z").unwrap();

        let job = job_repo::find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(job.stage, "transcribing");
        assert_eq!(job.audio_path.as_deref(), Some("/media/j1.mp3"));

        let chunks = list(&db, "j1").unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].idx, 0);
        assert_eq!(chunks[1].start_offset, 20.0);
        assert!(!chunks[0].transcribed);
    }

    #[test]
    fn test_commit_plan_replaces_previous_attempt() {
        let db = test_db_with_job("j2");
        commit_plan(&db, "j2", "/media/j2.mp3", &spans(), "2026-01-01T00:01:00Z").unwrap();
        commit_transcribed(
            &db,
            "j2",
            0,
            &[Segment {
                text: "hallo".to_string(),
                start: 0.0,
                end: 2.0,
            }],
            "2026-01-01T00:02:00Z",
        )
        .unwrap();

        let one_span = vec![ChunkSpan {
            index: 0,
            start: 0.0,
            end: 40.0,
        }];
        commit_plan(&db, "j2", "/media/j2.mp3", &one_span, "2026-01-01T00:03:00Z").unwrap();

        let chunks = list(&db, "j2").unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].transcribed);
        assert!(list_segments(&db, "j2").unwrap().is_empty());
    }

    #[test]
    fn test_commit_plan_unknown_job_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let result = commit_plan(&db, "ghost", "/media/x.mp3", &spans(), "2026-01-01T00:00:00Z");
        assert!(result.is_err());
    }

    #[test]
    fn test_commit_transcribed_marks_flag_and_appends_segments() {
        let db = test_db_with_job("j3");
        commit_plan(&db, "j3", "/media/j3.mp3", &spans(), "2026-01-01T00:01:00Z").unwrap();

        let segments = vec![
            Segment {
                text: "goedemorgen".to_string(),
                start: 20.0,
                end: 22.5,
            },
            Segment {
                text: "hoe gaat het".to_string(),
                start: 22.5,
                end: 24.0,
            },
        ];
        commit_transcribed(&db, "j3", 1, &segments, "2026-01-01T00:02:00Z").unwrap();

        let chunks = list(&db, "j3").unwrap();
        assert!(!chunks[0].transcribed);
        assert!(chunks[1].transcribed);

        let stored = list_segments(&db, "j3").unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].text, "goedemorgen");
        assert_eq!(stored[1].start, 22.5);
    }

    #[test]
    fn test_commit_transcribed_twice_is_rejected() {
        let db = test_db_with_job("j4");
        commit_plan(&db, "j4", "/media/j4.mp3", &spans(), "2026-01-01T00:01:00Z").unwrap();

        commit_transcribed(&db, "j4", 0, &[], "2026-01-01T00:02:00Z").unwrap();
        let result = commit_transcribed(&db, "j4", 0, &[], "2026-01-01T00:03:00Z");
        assert!(matches!(result, Err(DatabaseError::Inconsistent(_))));
    }

    #[test]
    fn test_list_segments_orders_by_chunk_then_seq() {
        let db = test_db_with_job("j5");
        commit_plan(&db, "j5", "/media/j5.mp3", &spans(), "2026-01-01T00:01:00Z").unwrap();

        commit_transcribed(
            &db,
            "j5",
            1,
            &[Segment {
                text: "tweede".to_string(),
                start: 20.0,
                end: 21.0,
            }],
            "2026-01-01T00:02:00Z",
        )
        .unwrap();
        commit_transcribed(
            &db,
            "j5",
            0,
            &[Segment {
                text: "eerste".to_string(),
                start: 0.0,
                end: 1.0,
            }],
            "2026-01-01T00:03:00Z",
        )
        .unwrap();

        let stored = list_segments(&db, "j5").unwrap();
        assert_eq!(stored[0].text, "eerste");
        assert_eq!(stored[1].text, "tweede");
    }
}
