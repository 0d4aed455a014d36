//! Bounded retry with exponential backoff.
//!
//! Wraps a whole attempt function: each failure either stops the run
//! (permanent errors), restarts it after a delay, or, once the attempt
//! budget is spent, ends in [`JudgeError::RetriesExhausted`].

use std::future::Future;
use std::time::Duration;

use salin_config::JudgeConfig;
use salin_core::error::{JudgeError, ProviderError};
use tracing::{info, warn};

/// How many times to attempt, and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Growth factor applied per further failure.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &JudgeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// A policy that retries immediately.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay after the `failed_attempt`-th failure (1-based).
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_backoff.as_secs_f64()).max(0.0);
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_backoff)
    }

    /// Run `attempt` until it succeeds, fails permanently, or the budget is
    /// spent. The closure receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T, JudgeError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, JudgeError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut number = 0;

        loop {
            number += 1;
            let error = match attempt(number).await {
                Ok(value) => {
                    if number > 1 {
                        info!(attempts = number, "Succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                warn!(attempt = number, error = %error, "Permanent failure, not retrying");
                return Err(error);
            }

            if number >= max_attempts {
                warn!(attempts = number, error = %error, "Retry budget exhausted");
                return Err(JudgeError::RetriesExhausted {
                    attempts: number,
                    last: Box::new(error),
                });
            }

            let delay = self.delay_after(number, &error);
            warn!(
                attempt = number,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Backoff for this failure, stretched to a provider's `retry-after`
    /// hint but never past `max_backoff`.
    fn delay_after(&self, failed_attempt: u32, error: &JudgeError) -> Duration {
        let backoff = self.backoff_for(failed_attempt);
        match error {
            JudgeError::Provider {
                source: ProviderError::RateLimited { retry_after_secs },
                ..
            } => backoff
                .max(Duration::from_secs(*retry_after_secs))
                .min(self.max_backoff.max(backoff)),
            _ => backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salin_core::judgment::PipelineStage;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn malformed() -> JudgeError {
        JudgeError::MalformedOutput {
            stage: PipelineStage::Initial,
            reason: "not json".into(),
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(3),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(4), Duration::from_secs(3));
        assert_eq!(policy.backoff_for(40), Duration::from_secs(3));
    }

    #[test]
    fn policy_from_config() {
        let policy = RetryPolicy::from_config(&JudgeConfig::default());
        assert_eq!(policy, RetryPolicy::default());
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate(5)
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(malformed())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(3)
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(malformed()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result.unwrap_err() {
            JudgeError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, JudgeError::MalformedOutput { .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn permanent_errors_stop_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(5)
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(JudgeError::Provider {
                        stage: PipelineStage::Initial,
                        source: ProviderError::AuthenticationFailed("bad key".into()),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result.unwrap_err(), JudgeError::Provider { .. }));
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let result = RetryPolicy::immediate(0).run(|_| async { Ok::<_, JudgeError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(8),
        };
        let start = tokio::time::Instant::now();
        let _: Result<(), _> = policy.run(|_| async { Err(malformed()) }).await;
        // 500ms after the first failure, 1s after the second.
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[test]
    fn rate_limit_hint_stretches_delay_within_cap() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(8),
        };
        let limited = |secs| JudgeError::Provider {
            stage: PipelineStage::Reflecting,
            source: ProviderError::RateLimited {
                retry_after_secs: secs,
            },
        };
        assert_eq!(policy.delay_after(1, &limited(3)), Duration::from_secs(3));
        assert_eq!(policy.delay_after(1, &limited(60)), Duration::from_secs(8));
        assert_eq!(policy.delay_after(1, &malformed()), Duration::from_millis(500));
    }
}
