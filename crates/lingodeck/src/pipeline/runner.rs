use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info, info_span, Instrument};

use crate::assemble::SentenceAssembler;
use crate::config::Config;
use crate::db::job_repo::JobRow;
use crate::db::{chunk_repo, job_repo, now_rfc3339, sentence_repo, Database, DatabaseError};
use crate::error::ExplanationError;
use crate::explain::{ChatExplainer, ExplanationService};
use crate::media::{plan_chunks, FfmpegNormalizer, MediaService};
use crate::transcribe::{Segment, TranscriptionService, WhisperClient};
use crate::worker::job::{CancelFlag, JobResult};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter};
use super::retry::RetryPolicy;
use super::stage::Stage;

/// How a stage step ended: all units done, or stopped at a unit boundary
/// because cancellation was requested.
enum Flow {
    Completed,
    Cancelled(Stage),
}

/// Drives one job through extract → transcribe → explain → ready.
///
/// Every unit of work (the normalization run, one chunk, one batch) is
/// committed durably before the next unit starts, and the entry stage is
/// always derived from committed state, so a crashed or resubmitted job
/// resumes at its last completed unit.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    db: Database,
    media: Arc<dyn MediaService>,
    transcriber: Arc<dyn TranscriptionService>,
    explainer: Arc<dyn ExplanationService>,
    assembler: SentenceAssembler,
    retry: RetryPolicy,
}

impl Pipeline {
    /// Production constructor that builds all service clients from config.
    pub fn from_config(config: &Config, db: Database) -> crate::error::Result<Self> {
        let media = FfmpegNormalizer::new(&config.ffmpeg, config.transcription.chunk_bitrate_kbps);
        let transcriber = WhisperClient::new(&config.transcription)?;
        let explainer = ChatExplainer::new(&config.explanation)?;
        let pipeline_config = Arc::new(PipelineConfig::from_config(config));
        let assembler = SentenceAssembler::new(pipeline_config.max_sentence_words);

        Ok(Self {
            config: pipeline_config,
            db,
            media: Arc::new(media),
            transcriber: Arc::new(transcriber),
            explainer: Arc::new(explainer),
            assembler,
            retry: RetryPolicy::from_config(&config.retry),
        })
    }

    /// Constructor with injected services, for tests and alternative
    /// backends.
    pub fn with_services(
        config: Arc<PipelineConfig>,
        db: Database,
        media: Arc<dyn MediaService>,
        transcriber: Arc<dyn TranscriptionService>,
        explainer: Arc<dyn ExplanationService>,
        retry: RetryPolicy,
    ) -> Self {
        let assembler = SentenceAssembler::new(config.max_sentence_words);
        Self {
            config,
            db,
            media,
            transcriber,
            explainer,
            assembler,
            retry,
        }
    }

    /// Runs the job to a terminal state (or a cancellation boundary).
    /// Failures are recorded on the job row; this never panics the caller.
    pub async fn run(
        &self,
        job_id: &str,
        cancel: &CancelFlag,
        progress: &dyn ProgressReporter,
    ) -> JobResult {
        let span = info_span!("pipeline", job_id = %job_id);
        async {
            match self.run_inner(job_id, cancel, progress).await {
                Ok(Flow::Completed) => {
                    info!("job ready");
                    progress.report(ProgressEvent::Completed);
                    JobResult::success(job_id)
                }
                Ok(Flow::Cancelled(stage)) => {
                    info!("job stopped between units in stage {}", stage);
                    JobResult::cancelled(job_id, stage)
                }
                Err(err) => {
                    let stage = err.stage();
                    let detail = err.detail();
                    if let Err(db_err) = job_repo::update_stage(
                        &self.db,
                        job_id,
                        Stage::Error.as_str(),
                        Some(&detail),
                        &now_rfc3339(),
                    ) {
                        tracing::error!("failed to record job error: {}", db_err);
                    }
                    progress.report(ProgressEvent::Failed {
                        stage,
                        error: detail.clone(),
                    });
                    JobResult::failure(job_id, stage, detail)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_inner(
        &self,
        job_id: &str,
        cancel: &CancelFlag,
        progress: &dyn ProgressReporter,
    ) -> Result<Flow, PipelineError> {
        let job = job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;

        if Stage::parse(&job.stage) == Some(Stage::Ready) {
            return Ok(Flow::Completed);
        }

        let mut stage = resume_stage(&job);
        debug!("entering stage {} (stored stage {})", stage, job.stage);

        loop {
            match stage {
                Stage::Extracting => {
                    self.set_stage(job_id, Stage::Extracting, progress)?;
                    self.step_extract(&job).await?;
                    stage = Stage::Transcribing;
                }
                Stage::Transcribing => {
                    self.set_stage(job_id, Stage::Transcribing, progress)?;
                    match self.step_transcribe(job_id, cancel, progress).await? {
                        Flow::Cancelled(s) => return Ok(Flow::Cancelled(s)),
                        Flow::Completed => stage = Stage::Explaining,
                    }
                }
                Stage::Explaining => {
                    self.set_stage(job_id, Stage::Explaining, progress)?;
                    match self.step_explain(job_id, cancel, progress).await? {
                        Flow::Cancelled(s) => return Ok(Flow::Cancelled(s)),
                        Flow::Completed => stage = Stage::Ready,
                    }
                }
                _ => {
                    // All units are committed; only the terminal commit remains.
                    job_repo::update_stage(
                        &self.db,
                        job_id,
                        Stage::Ready.as_str(),
                        None,
                        &now_rfc3339(),
                    )?;
                    progress.report(ProgressEvent::Stage {
                        stage: Stage::Ready,
                        message: Stage::Ready.description().to_string(),
                    });
                    return Ok(Flow::Completed);
                }
            }
        }
    }

    fn set_stage(
        &self,
        job_id: &str,
        stage: Stage,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        job_repo::update_stage(&self.db, job_id, stage.as_str(), None, &now_rfc3339())?;
        progress.report(ProgressEvent::Stage {
            stage,
            message: stage.description().to_string(),
        });
        Ok(())
    }

    /// Normalizes the source media, probes its duration, and commits the
    /// audio path plus the chunk plan as one durable update.
    async fn step_extract(&self, job: &JobRow) -> Result<(), PipelineError> {
        let source = PathBuf::from(&job.source_path);
        let audio_path = self.config.media_directory.join(format!("{}.mp3", job.id));

        let duration = self
            .retry
            .run("audio extraction", || async {
                self.media.normalize(&source, &audio_path).await?;
                self.media.probe_duration(&audio_path).await
            })
            .await?;

        let spans = plan_chunks(
            duration,
            self.config.chunk_bitrate_kbps,
            self.config.max_chunk_bytes,
        );
        debug!(
            "normalized {:.1}s of audio into {} chunk(s)",
            duration,
            spans.len()
        );

        chunk_repo::commit_plan(
            &self.db,
            &job.id,
            &audio_path.to_string_lossy(),
            &spans,
            &now_rfc3339(),
        )?;
        Ok(())
    }

    /// Transcribes every not-yet-transcribed chunk, committing each chunk's
    /// flag and segments atomically, then assembles sentences once.
    async fn step_transcribe(
        &self,
        job_id: &str,
        cancel: &CancelFlag,
        progress: &dyn ProgressReporter,
    ) -> Result<Flow, PipelineError> {
        let job = job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
        let audio_path = PathBuf::from(job.audio_path.as_deref().unwrap_or_default());

        let chunks = chunk_repo::list(&self.db, job_id)?;
        let total = chunks.len() as u32;

        for chunk in chunks.iter().filter(|c| !c.transcribed) {
            if cancel.is_cancelled() {
                return Ok(Flow::Cancelled(Stage::Transcribing));
            }

            let chunk_path = self
                .config
                .media_directory
                .join(format!("{}.chunk{:03}.mp3", job_id, chunk.idx));

            self.retry
                .run("chunk encoding", || {
                    self.media.slice(
                        &audio_path,
                        &chunk_path,
                        chunk.start_offset,
                        chunk.end_offset - chunk.start_offset,
                    )
                })
                .await
                .map_err(|e| PipelineError::ChunkEncode {
                    index: chunk.idx,
                    source: e,
                })?;

            let segments = self
                .retry
                .run("transcription", || {
                    self.transcriber.transcribe(&chunk_path, &self.config.language)
                })
                .await
                .map_err(|e| PipelineError::Transcription {
                    index: chunk.idx,
                    source: e,
                })?;

            // Remap chunk-relative timestamps to absolute recording time.
            let segments: Vec<Segment> = segments
                .into_iter()
                .map(|s| s.offset_by(chunk.start_offset))
                .collect();

            chunk_repo::commit_transcribed(&self.db, job_id, chunk.idx, &segments, &now_rfc3339())?;
            let _ = tokio::fs::remove_file(&chunk_path).await;

            debug!(
                "chunk {}/{} transcribed ({} segments)",
                chunk.idx + 1,
                total,
                segments.len()
            );
            progress.report(ProgressEvent::ChunkTranscribed {
                index: chunk.idx,
                total,
            });
        }

        if cancel.is_cancelled() {
            return Ok(Flow::Cancelled(Stage::Transcribing));
        }

        let all_segments = chunk_repo::list_segments(&self.db, job_id)?;
        let sentences = self.assembler.assemble(&all_segments)?;
        sentence_repo::commit_assembly(&self.db, job_id, &sentences, &now_rfc3339())?;
        debug!("assembled {} sentences", sentences.len());

        Ok(Flow::Completed)
    }

    /// Annotates sentences in fixed-size batches. Each batch is committed
    /// (fields, keywords, counter) as one durable update; the next batch is
    /// always recomputed from the committed counter.
    async fn step_explain(
        &self,
        job_id: &str,
        cancel: &CancelFlag,
        progress: &dyn ProgressReporter,
    ) -> Result<Flow, PipelineError> {
        let job = job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
        let total = job.total_sentences;
        let mut explained = job.explained_sentences;

        while explained < total {
            if cancel.is_cancelled() {
                return Ok(Flow::Cancelled(Stage::Explaining));
            }

            let rows = sentence_repo::list_range(&self.db, job_id, explained, self.config.batch_size)?;
            if rows.is_empty() {
                return Err(PipelineError::Database(DatabaseError::Inconsistent(
                    format!(
                        "job {} reports {} unexplained sentences but none are stored",
                        job_id,
                        total - explained
                    ),
                )));
            }
            let texts: Vec<String> = rows.iter().map(|r| r.text.clone()).collect();

            let annotations = self
                .retry
                .run("explanation", || self.explainer.explain(&texts))
                .await
                .map_err(|e| PipelineError::Explanation {
                    start: explained,
                    source: e,
                })?;

            if annotations.len() != texts.len() {
                return Err(PipelineError::Explanation {
                    start: explained,
                    source: ExplanationError::CountMismatch {
                        expected: texts.len(),
                        got: annotations.len(),
                    },
                });
            }

            sentence_repo::commit_batch(&self.db, job_id, explained, &annotations, &now_rfc3339())?;
            explained += annotations.len() as u32;
            debug!("explained {}/{} sentences", explained, total);
            progress.report(ProgressEvent::BatchExplained { explained, total });

            if explained < total && !self.config.batch_delay.is_zero() {
                sleep(self.config.batch_delay).await;
            }
        }

        Ok(Flow::Completed)
    }
}

/// Derives the stage to enter from committed state alone. This is both the
/// crash-resume scan and the operator-resubmission path: work that already
/// reached the store is never redone.
fn resume_stage(job: &JobRow) -> Stage {
    if job.audio_path.is_none() {
        Stage::Extracting
    } else if job.total_sentences == 0 {
        Stage::Transcribing
    } else if job.explained_sentences < job.total_sentences {
        Stage::Explaining
    } else {
        Stage::Ready
    }
}
