//! Bounded polling with exponential backoff
//!
//! Used wherever a resource becomes usable asynchronously (tables turning
//! active, functions finishing an update).

use crate::error::{CloudError, ErrorKind, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Retry configuration for readiness polling
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of probes
    pub max_attempts: u32,

    /// Initial delay between probes
    pub initial_delay: Duration,

    /// Maximum delay between probes
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,

    /// Give up once this much time has passed
    pub max_elapsed: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(15),
            backoff_multiplier: 2.0,
            max_elapsed: Duration::from_secs(300),
        }
    }
}

impl RetryConfig {
    /// No waiting between probes; for tests and fakes
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_elapsed: Duration::from_secs(5),
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Probe until it yields a value.
///
/// `Ok(None)` and [`ErrorKind::TransientPending`] errors mean "not yet";
/// any other error ends the wait immediately. Exceeding the attempt or
/// elapsed-time bound is a [`CloudError::Timeout`].
pub async fn wait_until<T, F, Fut>(config: &RetryConfig, what: &str, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let started = Instant::now();

    for attempt in 0..config.max_attempts {
        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                tracing::debug!("{} not ready yet (attempt {})", what, attempt + 1);
            }
            Err(e) if e.kind() == ErrorKind::TransientPending => {
                tracing::debug!("{} pending: {} (attempt {})", what, e, attempt + 1);
            }
            Err(e) => return Err(e),
        }

        if attempt + 1 < config.max_attempts {
            let delay = config.delay_for_attempt(attempt);
            if started.elapsed() + delay > config.max_elapsed {
                break;
            }
            sleep(delay).await;
        }
    }

    Err(CloudError::Timeout(format!(
        "{} was not ready after {:.1}s",
        what,
        started.elapsed().as_secs_f64()
    )))
}
