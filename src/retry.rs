use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Fixed-shape retry policy mirroring a Temporal `RetryPolicy`: a bounded
/// attempt count with exponential backoff between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub backoff_coefficient: f64,
}

impl RetryPolicy {
    /// Command Dispatch (§4.2, §5): up to 5 attempts. The spec only fixes
    /// the attempt count and per-attempt/overall deadlines (enforced by the
    /// caller via `tokio::time::timeout`); the backoff shape between
    /// attempts is an implementation detail not specified, chosen modest
    /// and short since dispatch targets an in-process actor rather than a
    /// remote call.
    pub const fn dispatch() -> Self {
        Self {
            max_attempts: 5,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            backoff_coefficient: 2.0,
        }
    }

    /// Payment validation (§5): 3 attempts, 1s initial, 5s max, 2.0 coefficient.
    pub const fn payment() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(5),
            backoff_coefficient: 2.0,
        }
    }
}

/// Runs `f` up to `policy.max_attempts` times, sleeping with exponential
/// backoff between failed attempts. Returns the last error if every attempt
/// fails.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut interval = policy.initial_interval;
    let mut last_err: Option<E> = None;

    for attempt in 1..=policy.max_attempts {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                warn!(attempt, max_attempts = policy.max_attempts, error = %e, "attempt failed");
                last_err = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(interval).await;
                    let next = interval.as_secs_f64() * policy.backoff_coefficient;
                    interval = Duration::from_secs_f64(next.min(policy.max_interval.as_secs_f64()));
                }
            }
        }
    }

    Err(last_err.expect("at least one attempt always runs"))
}
