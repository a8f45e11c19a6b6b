//! # Retry Policy
//!
//! Bounded retry of transient gateway failures.
//!
//! ```text
//! attempt 1 ──✗ transient──► sleep 500ms ──► attempt 2 ──✗──► sleep 1.5s
//!     ──► attempt 3 ──✗──► sleep 3s ──► attempt 4 ──✗──► Exhausted
//! ```
//!
//! Non-transient failures (NotFound, Validation, ServerRejected) are never
//! retried. Waits go through the injected [`Clock`].

use backoff::backoff::Backoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::clock::Clock;
use crate::error::{GatewayError, GatewayResult};

/// The configured sequence of waits between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        RetryPolicy { delays }
    }

    /// No retries: the first transient failure exhausts the policy.
    pub fn none() -> Self {
        RetryPolicy { delays: Vec::new() }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    pub fn schedule(&self) -> DelaySchedule {
        DelaySchedule {
            delays: self.delays.clone(),
            next: 0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(vec![
            Duration::from_millis(500),
            Duration::from_millis(1_500),
            Duration::from_millis(3_000),
        ])
    }
}

/// A [`Backoff`] walking a fixed list of delays, then giving up.
#[derive(Debug, Clone)]
pub struct DelaySchedule {
    delays: Vec<Duration>,
    next: usize,
}

impl Backoff for DelaySchedule {
    fn next_backoff(&mut self) -> Option<Duration> {
        let delay = self.delays.get(self.next).copied();
        if delay.is_some() {
            self.next += 1;
        }
        delay
    }

    fn reset(&mut self) {
        self.next = 0;
    }
}

/// Why a retried operation finally failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// A non-transient failure; returned on first sight.
    Fatal(GatewayError),

    /// Every attempt failed transiently.
    Exhausted { attempts: usize, last: GatewayError },
}

/// Runs `op` until it succeeds, fails non-transiently, or the policy runs out.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    operation: &str,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    let mut schedule = policy.schedule();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => match schedule.next_backoff() {
                Some(delay) => {
                    warn!(
                        operation = %operation,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    clock.sleep(delay).await;
                }
                None => {
                    warn!(
                        operation = %operation,
                        attempts = attempts,
                        error = %err,
                        "Retries exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        attempts,
                        last: err,
                    });
                }
            },
            Err(err) => return Err(RetryError::Fatal(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transient() -> GatewayError {
        GatewayError::TransientNetwork("connection reset".into())
    }

    #[test]
    fn test_schedule_walks_delays_then_stops() {
        let mut schedule = RetryPolicy::default().schedule();
        assert_eq!(schedule.next_backoff(), Some(Duration::from_millis(500)));
        assert_eq!(schedule.next_backoff(), Some(Duration::from_millis(1500)));
        assert_eq!(schedule.next_backoff(), Some(Duration::from_millis(3000)));
        assert_eq!(schedule.next_backoff(), None);
        assert_eq!(schedule.next_backoff(), None);

        schedule.reset();
        assert_eq!(schedule.next_backoff(), Some(Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn test_succeeds_after_two_transient_failures() {
        let clock = ManualClock::default();
        let calls = AtomicUsize::new(0);

        let result = retry_transient(&RetryPolicy::default(), &clock, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(transient())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(500), Duration::from_millis(1500)]
        );
    }

    #[tokio::test]
    async fn test_exhaustion_after_all_attempts() {
        let clock = ManualClock::default();
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = retry_transient(&RetryPolicy::default(), &clock, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 4,
                last: transient()
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(clock.sleeps().len(), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let clock = ManualClock::default();
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = retry_transient(&RetryPolicy::default(), &clock, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Validation("bad page size".into())) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Fatal(GatewayError::Validation(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());
    }
}
