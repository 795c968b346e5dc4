pub mod job;
pub mod pool;

pub use job::{CancelFlag, JobRequest, JobResult, JobStatus};
pub use pool::WorkerPool;
