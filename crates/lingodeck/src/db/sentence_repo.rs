//! Sentence repository: the resume checkpoint for the explaining stage.
//!
//! `commit_assembly` inserts the full sentence list together with the
//! transition to `explaining`; `commit_batch` writes one batch of
//! annotations and advances the job's `explained_sentences` counter in the
//! same transaction, keeping the counter consistent with persisted content.

use rusqlite::params;

use super::{Database, DatabaseError};
use crate::assemble::Sentence;
use crate::explain::Annotation;

/// A raw sentence row from the database.
#[derive(Debug, Clone)]
pub struct SentenceRow {
    pub job_id: String,
    pub idx: u32,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub translation: Option<String>,
    pub explanation_native: Option<String>,
    pub explanation_foreign: Option<String>,
}

/// A raw keyword row from the database.
#[derive(Debug, Clone)]
pub struct KeywordRow {
    pub id: String,
    pub job_id: String,
    pub sentence_idx: u32,
    pub word: String,
    pub meaning_native: String,
    pub meaning_foreign: String,
}

/// Commits the assembly result: inserts all sentences, sets the job's
/// sentence counters, and transitions to `explaining` as one durable
/// update. Sentences from a previous attempt are replaced.
pub fn commit_assembly(
    db: &Database,
    job_id: &str,
    sentences: &[Sentence],
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_tx(|conn| {
        conn.execute("DELETE FROM keywords WHERE job_id = ?1", params![job_id])?;
        conn.execute("DELETE FROM sentences WHERE job_id = ?1", params![job_id])?;

        let mut stmt = conn.prepare(
            "INSERT INTO sentences (job_id, idx, text, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (idx, sentence) in sentences.iter().enumerate() {
            stmt.execute(params![
                job_id,
                idx as i64,
                sentence.text,
                sentence.start_time,
                sentence.end_time,
            ])?;
        }

        let updated = conn.execute(
            "UPDATE jobs SET total_sentences = ?2, explained_sentences = 0,
             stage = 'explaining', error = NULL, updated_at = ?3 WHERE id = ?1",
            params![job_id, sentences.len() as i64, updated_at],
        )?;
        if updated != 1 {
            return Err(DatabaseError::Inconsistent(format!(
                "job {} not found while committing assembly",
                job_id
            )));
        }
        Ok(())
    })
}

/// Lists a job's sentences ordered by index.
pub fn list(db: &Database, job_id: &str) -> Result<Vec<SentenceRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT job_id, idx, text, start_time, end_time, translation,
             explanation_native, explanation_foreign
             FROM sentences WHERE job_id = ?1 ORDER BY idx",
        )?;
        let rows: Vec<SentenceRow> = stmt
            .query_map(params![job_id], sentence_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Lists up to `limit` sentences starting at `start_idx`, ordered by index.
pub fn list_range(
    db: &Database,
    job_id: &str,
    start_idx: u32,
    limit: usize,
) -> Result<Vec<SentenceRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT job_id, idx, text, start_time, end_time, translation,
             explanation_native, explanation_foreign
             FROM sentences WHERE job_id = ?1 AND idx >= ?2 ORDER BY idx LIMIT ?3",
        )?;
        let rows: Vec<SentenceRow> = stmt
            .query_map(params![job_id, start_idx, limit as i64], sentence_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

fn sentence_from_row(row: &rusqlite::Row<'_>) -> Result<SentenceRow, rusqlite::Error> {
    Ok(SentenceRow {
        job_id: row.get(0)?,
        idx: row.get(1)?,
        text: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        translation: row.get(5)?,
        explanation_native: row.get(6)?,
        explanation_foreign: row.get(7)?,
    })
}

/// Applies one explanation batch: writes annotation fields and keywords for
/// the sentences `[start_idx, start_idx + annotations.len())` and advances
/// the job's `explained_sentences` counter, all in one transaction. The
/// counter update is guarded against concurrent movement.
pub fn commit_batch(
    db: &Database,
    job_id: &str,
    start_idx: u32,
    annotations: &[Annotation],
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_tx(|conn| {
        let mut update = conn.prepare(
            "UPDATE sentences SET translation = ?3, explanation_native = ?4,
             explanation_foreign = ?5 WHERE job_id = ?1 AND idx = ?2",
        )?;
        let mut insert_keyword = conn.prepare(
            "INSERT INTO keywords (id, job_id, sentence_idx, word, meaning_native, meaning_foreign)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;

        for (offset, annotation) in annotations.iter().enumerate() {
            let idx = start_idx + offset as u32;
            let updated = update.execute(params![
                job_id,
                idx,
                annotation.translation,
                annotation.explanation_native,
                annotation.explanation_foreign,
            ])?;
            if updated != 1 {
                return Err(DatabaseError::Inconsistent(format!(
                    "sentence {}/{} missing while applying batch",
                    job_id, idx
                )));
            }

            for keyword in &annotation.keywords {
                insert_keyword.execute(params![
                    uuid::Uuid::new_v4().to_string(),
                    job_id,
                    idx,
                    keyword.word,
                    keyword.meaning_native,
                    keyword.meaning_foreign,
                ])?;
            }
        }

        let new_explained = start_idx as i64 + annotations.len() as i64;
        let updated = conn.execute(
            "UPDATE jobs SET explained_sentences = ?3, updated_at = ?4
             WHERE id = ?1 AND explained_sentences = ?2",
            params![job_id, start_idx, new_explained, updated_at],
        )?;
        if updated != 1 {
            return Err(DatabaseError::Inconsistent(format!(
                "explained counter for job {} moved while applying batch at {}",
                job_id, start_idx
            )));
        }
        Ok(())
    })
}

/// Lists a sentence's keywords.
pub fn list_keywords(
    db: &Database,
    job_id: &str,
    sentence_idx: u32,
) -> Result<Vec<KeywordRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, job_id, sentence_idx, word, meaning_native, meaning_foreign
             FROM keywords WHERE job_id = ?1 AND sentence_idx = ?2",
        )?;
        let rows: Vec<KeywordRow> = stmt
            .query_map(params![job_id, sentence_idx], |row| {
                Ok(KeywordRow {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    sentence_idx: row.get(2)?,
                    word: row.get(3)?,
                    meaning_native: row.get(4)?,
                    meaning_foreign: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
