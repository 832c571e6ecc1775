use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Bounded retry with a constant (non-exponential) delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Run `op` until it succeeds or `max_attempts` consecutive failures have
/// been seen, sleeping the fixed delay between attempts. Returns the last
/// error once the ceiling is reached; the error never escalates further on
/// its own. Stateless and reentrant: concurrent retries on different inputs
/// do not interact.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                tracing::error!("{} failed after {} attempts: {}", label, attempt, e);
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    "{} attempt {} failed: {}. Retrying in {:?}",
                    label,
                    attempt,
                    e,
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
