//! Bounded retry with exponential backoff and jitter.
//!
//! Only transient failures are retried; conflicts and validation
//! errors return immediately. Every retried statement block is
//! idempotent (delete-then-create upserts, whole-transaction
//! re-application), so re-running a partially observed write is safe.

use std::cmp;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use permea_core::error::{PermError, PermResult};

/// Backoff parameters for retrying transient storage failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    pub initial_backoff: Duration,
    /// Backoff growth factor per attempt.
    pub multiplier: f64,
    /// Upper bound on the computed backoff (before jitter).
    pub max_backoff: Duration,
    /// Jitter factor: each pause is drawn from `[d*(1-j), d*(1+j)]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(2),
            jitter: 0.25,
        }
    }
}

/// Run `op`, retrying while it fails with [`PermError::Transient`] and
/// attempts remain. The final transient error is returned as-is once
/// the budget is exhausted.
pub async fn run<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> PermResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PermResult<T>>,
{
    let mut attempt: u32 = 0;
    let mut backoff = policy.initial_backoff;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(PermError::Transient(msg)) if attempt < policy.max_attempts => {
                let pause = apply_jitter(backoff, policy.jitter);
                debug!(
                    attempt,
                    backoff_ms = pause.as_millis() as u64,
                    error = %msg,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(pause).await;
                backoff = cmp::min(
                    Duration::from_nanos(
                        (backoff.as_nanos() as f64 * policy.multiplier) as u64,
                    ),
                    policy.max_backoff,
                );
            }
            Err(err) => return Err(err),
        }
    }
}

fn apply_jitter(dur: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return dur;
    }
    let factor = factor.clamp(0.0, 1.0);
    let base = dur.as_nanos() as f64;
    let jittered = rand::thread_rng().gen_range(base * (1.0 - factor)..=base * (1.0 + factor));
    Duration::from_nanos(jittered as u64)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            multiplier: 2.0,
            max_backoff: Duration::from_millis(5),
            jitter: 0.0,
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = run(&fast_policy(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(PermError::Transient("connection reset".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let result: PermResult<()> = run(&fast_policy(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PermError::Transient("still down".into()))
        })
        .await;
        assert!(matches!(result, Err(PermError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let result: PermResult<()> = run(&fast_policy(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PermError::Conflict {
                entity: "permission".into(),
                id: "read".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(PermError::Conflict { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let dur = Duration::from_millis(1000);
        for _ in 0..100 {
            let jittered = apply_jitter(dur, 0.25).as_millis();
            assert!((750..=1250).contains(&jittered), "{jittered}ms out of bounds");
        }
        assert_eq!(apply_jitter(dur, 0.0), dur);
    }
}
