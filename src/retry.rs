//! Bounded exponential backoff for calls that can hit a quota.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay after the zero-based `attempt` failed: `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// The error was not worth retrying.
    #[error("{0}")]
    Fatal(E),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

/// Runs `op` until it succeeds, fails with an error `is_transient` rejects, or
/// the attempt budget runs out. Sleeps between attempts only, never after the last.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut op: F,
    is_transient: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_transient(&err) => return Err(RetryError::Fatal(err)),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                let delay = policy.delay_for(attempt - 1);
                tracing::warn!(
                    "⏳ Quota exceeded. Retrying in {:.1}s... (Attempt {}): {}",
                    delay.as_secs_f64(),
                    attempt,
                    err
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn instant() -> RetryPolicy {
        RetryPolicy::new(5, Duration::ZERO)
    }

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for(40), Duration::from_secs(1).saturating_mul(u32::MAX));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result: Result<&str, RetryError<String>> = retry(
            &instant(),
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err("429".to_string())
                    } else {
                        Ok("done")
                    }
                }
            },
            |e: &String| e == "429",
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn fatal_errors_stop_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), RetryError<String>> = retry(
            &instant(),
            || {
                calls.set(calls.get() + 1);
                async { Err("bad request".to_string()) }
            },
            |e: &String| e == "429",
        )
        .await;

        assert!(matches!(result, Err(RetryError::Fatal(ref e)) if e == "bad request"));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = Cell::new(0);
        let result: Result<(), RetryError<String>> = retry(
            &instant(),
            || {
                calls.set(calls.get() + 1);
                async { Err("429".to_string()) }
            },
            |_| true,
        )
        .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 5, .. })));
        assert_eq!(calls.get(), 5);
    }
}
