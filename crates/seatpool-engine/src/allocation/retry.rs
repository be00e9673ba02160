//! Bounded optimistic retry with jittered exponential backoff.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use seatpool_core::config::EngineConfig;
use seatpool_core::errors::{AllocError, AllocResult, StoreError};

/// Why an attempt stopped.
#[derive(Debug)]
pub(crate) enum Abort {
    /// A version or guard check failed at commit. Retry from scratch.
    Conflict,
    /// Anything else. Surfaced immediately.
    Error(AllocError),
}

impl From<StoreError> for Abort {
    fn from(e: StoreError) -> Self {
        if e.is_conflict() {
            Abort::Conflict
        } else {
            Abort::Error(e.into())
        }
    }
}

impl From<AllocError> for Abort {
    fn from(e: AllocError) -> Self {
        Abort::Error(e)
    }
}

/// Attempts, backoff bounds, and the overall deadline for one operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub deadline: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            deadline: config.store_timeout(),
        }
    }

    /// Upper bound of the sleep after failed attempt `attempt` (1-based):
    /// `min(base · 2^attempt, max)`.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }

    /// Uniform random sleep in `[0, backoff_ceiling(attempt)]`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }

    /// Run `attempt` until it succeeds, fails hard, or the budget runs out.
    ///
    /// Exhausting the attempts is `ConcurrentModification`; running past the
    /// deadline is `StoreUnavailable`.
    pub(crate) fn run<T>(
        &self,
        op: &'static str,
        mut attempt: impl FnMut(u32) -> Result<T, Abort>,
    ) -> AllocResult<T> {
        let started = Instant::now();
        for n in 1..=self.max_attempts {
            match attempt(n) {
                Ok(value) => return Ok(value),
                Err(Abort::Error(e)) => return Err(e),
                Err(Abort::Conflict) => {
                    if n == self.max_attempts {
                        break;
                    }
                    let delay = self.backoff(n);
                    if started.elapsed() + delay >= self.deadline {
                        return Err(AllocError::StoreUnavailable {
                            reason: format!(
                                "{} exceeded the store timeout of {}ms after {} attempts",
                                op,
                                self.deadline.as_millis(),
                                n
                            ),
                        });
                    }
                    debug!(op, attempt = n, delay_ms = delay.as_millis() as u64, "Write conflict, retrying");
                    std::thread::sleep(delay);
                }
            }
        }
        Err(AllocError::ConcurrentModification {
            attempts: self.max_attempts,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::from_millis(1),
            deadline: Duration::from_secs(5),
        }
    }

    #[test]
    fn ceiling_doubles_then_caps() {
        let policy = RetryPolicy {
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(100),
            ..quick(5)
        };
        assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(20));
        assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(40));
        assert_eq!(policy.backoff_ceiling(4), Duration::from_millis(100));
        assert_eq!(policy.backoff_ceiling(40), Duration::from_millis(100));
    }

    #[test]
    fn jitter_stays_under_ceiling() {
        let policy = RetryPolicy {
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(50),
            ..quick(5)
        };
        for attempt in 1..6 {
            assert!(policy.backoff(attempt) <= policy.backoff_ceiling(attempt));
        }
    }

    #[test]
    fn conflicts_then_success() {
        let mut calls = 0;
        let result = quick(5).run("test", |_| {
            calls += 1;
            if calls < 3 {
                Err(Abort::Conflict)
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn exhausted_attempts_is_concurrent_modification() {
        let mut calls = 0;
        let result: AllocResult<()> = quick(5).run("test", |_| {
            calls += 1;
            Err(Abort::Conflict)
        });
        assert_eq!(result.unwrap_err(), AllocError::ConcurrentModification { attempts: 5 });
        assert_eq!(calls, 5);
    }

    #[test]
    fn hard_errors_are_not_retried() {
        let mut calls = 0;
        let result: AllocResult<()> = quick(5).run("test", |_| {
            calls += 1;
            Err(Abort::Error(AllocError::Config("nope".into())))
        });
        assert!(matches!(result, Err(AllocError::Config(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn past_deadline_is_store_unavailable() {
        let policy = RetryPolicy {
            deadline: Duration::ZERO,
            ..quick(5)
        };
        let result: AllocResult<()> = policy.run("test", |_| Err(Abort::Conflict));
        assert!(matches!(result, Err(AllocError::StoreUnavailable { .. })));
    }

    #[test]
    fn store_conflict_converts_to_abort_conflict() {
        assert!(matches!(
            Abort::from(StoreError::conflict("license", 1)),
            Abort::Conflict
        ));
        assert!(matches!(
            Abort::from(StoreError::Unavailable { reason: "down".into() }),
            Abort::Error(AllocError::StoreUnavailable { .. })
        ));
    }
}
