//! Worker pool driving jobs through the pipeline.
//!
//! Worker threads pull requests off a bounded channel and drive the async
//! pipeline to completion through a shared runtime handle, one job at a
//! time per worker. Each running job gets a [`CancelFlag`] that can be
//! flipped through [`WorkerPool::cancel`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};
use tokio::sync::broadcast;

use crate::broadcast::{BroadcastProgress, JobProgressEvent};
use crate::config::Config;
use crate::db::{job_repo, now_rfc3339, Database};
use crate::error::WorkerError;
use crate::pipeline::{NoopProgress, Pipeline, ProgressReporter, Stage};
use crate::worker::job::{CancelFlag, JobRequest, JobResult};

type CancelRegistry = Arc<Mutex<HashMap<String, CancelFlag>>>;

pub struct WorkerPool {
    db: Database,
    job_sender: Sender<JobRequest>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    cancels: CancelRegistry,
    supported_extensions: Vec<String>,
}

impl WorkerPool {
    /// Production constructor that builds the pipeline from config.
    pub fn new(
        config: &Config,
        db: Database,
        runtime: tokio::runtime::Handle,
        progress_sender: Option<Arc<broadcast::Sender<JobProgressEvent>>>,
    ) -> crate::error::Result<Self> {
        let pipeline = Arc::new(Pipeline::from_config(config, db.clone())?);
        Ok(Self::with_pipeline(
            config,
            db,
            pipeline,
            runtime,
            progress_sender,
        ))
    }

    /// Constructor with an injected pipeline, for tests and alternative
    /// service stacks.
    ///
    /// # Panics
    /// Panics if `config.worker_count` is 0.
    pub fn with_pipeline(
        config: &Config,
        db: Database,
        pipeline: Arc<Pipeline>,
        runtime: tokio::runtime::Handle,
        progress_sender: Option<Arc<broadcast::Sender<JobProgressEvent>>>,
    ) -> Self {
        let worker_count = config.worker_count;
        assert!(worker_count > 0, "worker_count must be > 0");

        let (job_sender, job_receiver) = bounded::<JobRequest>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<JobResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));
        let cancels: CancelRegistry = Arc::new(Mutex::new(HashMap::new()));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_pipeline = Arc::clone(&pipeline);
            let worker_runtime = runtime.clone();
            let worker_cancels = Arc::clone(&cancels);
            let worker_progress = progress_sender.clone();

            let handle = thread::spawn(move || {
                run_worker(
                    worker_id,
                    job_rx,
                    result_tx,
                    shutdown_flag,
                    worker_pipeline,
                    worker_runtime,
                    worker_cancels,
                    worker_progress,
                );
            });

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Self {
            db,
            job_sender,
            result_receiver,
            workers,
            shutdown,
            cancels,
            supported_extensions: config.supported_extensions.clone(),
        }
    }

    /// Submits a recording for processing. Creates the job row in
    /// `pending` if it does not exist yet (resubmissions keep their
    /// committed progress) and returns immediately; processing is
    /// asynchronous.
    pub fn submit(&self, request: JobRequest) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        let extension = request.extension().unwrap_or_default();
        if !self
            .supported_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&extension))
        {
            return Err(WorkerError::UnsupportedMedia {
                path: request.source_path.clone(),
                extension,
            });
        }

        if job_repo::find_by_id(&self.db, &request.job_id)?.is_none() {
            let now = now_rfc3339();
            job_repo::insert(
                &self.db,
                &job_repo::JobRow {
                    id: request.job_id.clone(),
                    name: request.name.clone(),
                    source_path: request.source_path.to_string_lossy().to_string(),
                    audio_path: None,
                    media_type: request.media_type.clone(),
                    stage: Stage::Pending.as_str().to_string(),
                    error: None,
                    total_sentences: 0,
                    explained_sentences: 0,
                    created_at: now.clone(),
                    updated_at: now,
                },
            )?;
        }

        self.job_sender
            .send(request)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Requests a running job to stop at its next unit boundary. Returns
    /// false if the job is not currently running.
    pub fn cancel(&self, job_id: &str) -> bool {
        let Ok(cancels) = self.cancels.lock() else {
            return false;
        };
        match cancels.get(job_id) {
            Some(flag) => {
                flag.cancel();
                true
            }
            None => false,
        }
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<JobRequest>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    runtime: tokio::runtime::Handle,
    cancels: CancelRegistry,
    progress_sender: Option<Arc<broadcast::Sender<JobProgressEvent>>>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(request) => {
                debug!(
                    "Worker {} processing job {} ({})",
                    worker_id, request.job_id, request.name
                );

                let cancel = CancelFlag::new();
                if let Ok(mut registry) = cancels.lock() {
                    registry.insert(request.job_id.clone(), cancel.clone());
                }

                let result = match &progress_sender {
                    Some(sender) => {
                        let progress = BroadcastProgress::new(
                            &request.job_id,
                            &request.name,
                            Arc::clone(sender),
                        );
                        progress.report(crate::pipeline::ProgressEvent::Stage {
                            stage: Stage::Pending,
                            message: "Job queued for processing".to_string(),
                        });
                        runtime.block_on(pipeline.run(&request.job_id, &cancel, &progress))
                    }
                    None => runtime.block_on(pipeline.run(&request.job_id, &cancel, &NoopProgress)),
                };

                if let Ok(mut registry) = cancels.lock() {
                    registry.remove(&request.job_id);
                }

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
