//! Job repository: CRUD operations for the `jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub name: String,
    pub source_path: String,
    pub audio_path: Option<String>,
    pub media_type: Option<String>,
    pub stage: String,
    pub error: Option<String>,
    pub total_sentences: u32,
    pub explained_sentences: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            source_path: row.get("source_path")?,
            audio_path: row.get("audio_path")?,
            media_type: row.get("media_type")?,
            stage: row.get("stage")?,
            error: row.get("error")?,
            total_sentences: row.get("total_sentences")?,
            explained_sentences: row.get("explained_sentences")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, name, source_path, audio_path, media_type, stage, error,
             total_sentences, explained_sentences, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.id,
                job.name,
                job.source_path,
                job.audio_path,
                job.media_type,
                job.stage,
                job.error,
                job.total_sentences,
                job.explained_sentences,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists the most recent jobs, newest first.
pub fn list_recent(db: &Database, limit: u64) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?1")?;
        let rows: Vec<JobRow> = stmt
            .query_map(params![limit as i64], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Updates the stage and error detail of a job. Passing `error = None`
/// clears any previous error detail.
pub fn update_stage(
    db: &Database,
    id: &str,
    stage: &str,
    error: Option<&str>,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET stage = ?2, error = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, stage, error, updated_at],
        )?;
        Ok(())
    })
}

/// Counts jobs in the given stage.
pub fn count_by_stage(db: &Database, stage: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE stage = ?1",
            params![stage],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
