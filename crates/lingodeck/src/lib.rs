pub mod assemble;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod explain;
pub mod logging;
pub mod media;
pub mod pipeline;
pub mod transcribe;
pub mod worker;

pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, Config};
pub use error::{
    AssemblyError, ConfigError, ExplanationError, ExtractionError, LingodeckError, Result,
    TranscriptionError, WorkerError,
};
pub use pipeline::{progress_percent, Pipeline, PipelineConfig, RetryPolicy, Stage};
pub use worker::{CancelFlag, JobRequest, JobResult, JobStatus, WorkerPool};
