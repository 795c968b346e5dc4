//! Bounded retry with a fixed backoff schedule, applied uniformly to every
//! external call (normalization subprocess, transcription, explanation).

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; `delays[n-1]` is slept before
    /// retry `n`, with the last entry repeating for any further retries.
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delays: if delays.is_empty() {
                vec![Duration::from_secs(1)]
            } else {
                delays
            },
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config
                .delays_secs
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after failed attempt `attempt` (1-based).
    fn delay_after(&self, attempt: u32) -> Duration {
        let idx = (attempt as usize - 1).min(self.delays.len() - 1);
        self.delays[idx]
    }

    /// Runs `op` until it succeeds or the attempt budget is exhausted,
    /// returning the last error.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        label, attempt, self.max_attempts, err, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        "{} failed after {} attempts: {}",
                        label, self.max_attempts, err
                    );
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
