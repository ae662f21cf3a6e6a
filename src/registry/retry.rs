//! Retry policies for failed packument fetches

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::info;

use crate::config::RetryConfig;
use crate::version::error::RegistryError;

/// Handle a retry policy uses to resume a suspended fetch
///
/// Calling [`Resume::resume`] re-issues the request; dropping the handle gives
/// up and the fetch fails with the original error.
#[derive(Debug)]
pub struct Resume(oneshot::Sender<()>);

impl Resume {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    pub fn resume(self) {
        // The fetch may already be gone if every caller stopped waiting
        let _ = self.0.send(());
    }
}

/// Decides whether and when a failed fetch is retried
pub trait RetryPolicy: Send + Sync {
    /// Called after each failed attempt; `attempt` starts at 1
    ///
    /// May resume immediately, later, or never.
    fn retry(&self, error: &RegistryError, package_name: &str, attempt: u32, resume: Resume);
}

/// Exponential backoff: `base_delay * 2^(attempt - 1)`, capped at `max_delay`
///
/// Honours `retry-after` on rate limiting and never retries a missing package.
/// Resumes from a Tokio task, so it needs a running Tokio runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffRetry {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl BackoffRetry {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Returns None when retrying is disabled (`max_attempts == 0`)
    pub fn from_config(config: &RetryConfig) -> Option<Self> {
        (config.max_attempts > 0).then(|| {
            Self::new(
                config.max_attempts,
                Duration::from_millis(config.base_delay_ms),
                Duration::from_millis(config.max_delay_ms),
            )
        })
    }

    /// Delay before retry number `attempt`, or None to give up
    pub fn delay_for(&self, error: &RegistryError, attempt: u32) -> Option<Duration> {
        if error.is_not_found() || attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        if let RegistryError::RateLimited {
            retry_after_secs: Some(secs),
        } = error
        {
            return Some(Duration::from_secs(*secs));
        }

        let factor = 2u32.saturating_pow(attempt - 1);
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}

impl RetryPolicy for BackoffRetry {
    fn retry(&self, error: &RegistryError, package_name: &str, attempt: u32, resume: Resume) {
        let Some(delay) = self.delay_for(error, attempt) else {
            info!(
                "Giving up on {} after {} attempt(s): {}",
                package_name, attempt, error
            );
            return;
        };

        info!(
            "Retrying {} in {:?} (attempt {}/{}): {}",
            package_name, delay, attempt, self.max_attempts, error
        );
        tokio::spawn(async move {
            sleep(delay).await;
            resume.resume();
        });
    }
}
