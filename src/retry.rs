use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Fixed-delay retry policy applied at the call site of an outbound operation.
///
/// `max_attempts` counts the first try. The delay is slept between attempts,
/// never after the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Runs `op` until it succeeds or the attempts are used up.
    ///
    /// Returns the last error when every attempt fails.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max => {
                    tracing::warn!(
                        "Retrying {} due to error: {} (Attempt {}/{})",
                        label,
                        e,
                        attempt,
                        max
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("{} failed after {} attempts: {}", label, max, e);
                    return Err(e);
                }
            }
        }
    }
}
