//! Bounded retry with exponential backoff.
//!
//! [`RetryPolicy::run`] never returns an error: every attempt sequence ends
//! in a [`RetryOutcome`], so one failing item cannot take down its worker.

use std::future::Future;
use std::time::Duration;

use harvest_shared::HarvestError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a retried operation ended.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The operation succeeded on attempt number `attempts` (1-based).
    Succeeded { value: T, attempts: u32 },
    /// A soft failure; the item is skipped without another attempt.
    Skipped { reason: HarvestError },
    /// Attempts were exhausted, the error was permanent, or the run was cancelled.
    GaveUp { attempts: u32, last_error: HarvestError },
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Retry limits shared by every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Sleep after the failed attempt `attempt` (0-based): `base_delay * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `op` until it succeeds, fails softly, or attempts run out.
    ///
    /// `label` identifies the operation in logs (usually the item URL).
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = harvest_shared::Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(HarvestError::Cancelled),
                result = op() => result,
            };
            let attempts = attempt + 1;

            let err = match result {
                Ok(value) => {
                    if attempt > 0 {
                        info!(label, attempts, "succeeded after retry");
                    }
                    return RetryOutcome::Succeeded { value, attempts };
                }
                Err(err) if err.is_soft() => {
                    info!(label, reason = %err, "skipping");
                    return RetryOutcome::Skipped { reason: err };
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                debug!(label, error = %err, "not retryable");
                return RetryOutcome::GaveUp {
                    attempts,
                    last_error: err,
                };
            }

            if attempts >= self.max_attempts {
                warn!(label, attempts, error = %err, "giving up");
                return RetryOutcome::GaveUp {
                    attempts,
                    last_error: err,
                };
            }

            let delay = self.delay_for(attempt);
            warn!(
                label,
                attempt = attempts,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return RetryOutcome::GaveUp {
                        attempts,
                        last_error: HarvestError::Cancelled,
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn delays_double_and_never_decrease() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));

        let delays: Vec<Duration> = (0..40).map(|a| policy.delay_for(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn always_failing_op_is_attempted_exactly_max_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = fast_policy(3);

        let outcome: RetryOutcome<()> = policy
            .run("item", &CancellationToken::new(), || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HarvestError::fetch("http://x", "timed out"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match outcome {
            RetryOutcome::GaveUp { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(matches!(last_error, HarvestError::Fetch { .. }));
            }
            other => panic!("expected GaveUp, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn backoff_sleeps_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(20));
        let start = Instant::now();

        let outcome: RetryOutcome<()> = policy
            .run("item", &CancellationToken::new(), || async {
                Err(HarvestError::download("http://x", "reset"))
            })
            .await;

        // 20ms after the first failure, 40ms after the second, none after the last.
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome = fast_policy(3)
            .run("item", &CancellationToken::new(), || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(HarvestError::fetch("http://x", "HTTP 503"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                assert_eq!(value, "done");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected Succeeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn soft_failure_is_skipped_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: RetryOutcome<()> = fast_policy(3)
            .run("item", &CancellationToken::new(), || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HarvestError::MissingArtifact {
                        url: "http://x".into(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, RetryOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn permanent_failure_gives_up_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome: RetryOutcome<()> = fast_policy(3)
            .run("item", &CancellationToken::new(), || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HarvestError::validation("bad input"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, RetryOutcome::GaveUp { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn cancelled_run_stops_retrying() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));

        let outcome: RetryOutcome<()> = RetryPolicy::new(5, Duration::from_secs(60))
            .run("item", &cancel, || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HarvestError::fetch("http://x", "refused"))
                }
            })
            .await;

        assert!(matches!(
            outcome,
            RetryOutcome::GaveUp {
                last_error: HarvestError::Cancelled,
                ..
            }
        ));
        assert!(calls.load(Ordering::SeqCst) <= 1);
    }
}
