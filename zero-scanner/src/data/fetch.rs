//! Bounded-retry wrapper around provider calls.
//!
//! Every network operation in the scanner goes through `ResilientFetcher`:
//! transient failures are retried with exponential backoff, exhaustion
//! degrades to a typed "no data" outcome instead of an error, and payload
//! shape problems surface immediately without burning retries.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::provider::ProviderError;

// ============================================================================
// Fetch Policy
// ============================================================================

/// Retry and backoff tunables for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchPolicy {
    /// Total tries per operation, first attempt included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds (doubles with each retry)
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

impl FetchPolicy {
    /// Backoff delay before the retry that follows `attempt` (0-based).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .base_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);
        Duration::from_millis(delay_ms)
    }
}

// ============================================================================
// Fetch Outcome
// ============================================================================

/// Result of a resilient fetch.
///
/// `Absent` means the provider kept failing transiently and the caller
/// should take its conservative path (skip the sector, reject the
/// candidate) rather than abort the run. `Fault` means the provider
/// answered with a payload the scanner could not interpret.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Data(T),
    Absent,
    Fault(ProviderError),
}

impl<T> FetchOutcome<T> {
    /// Unwrap to `Some` only on `Data`.
    pub fn data(self) -> Option<T> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

// ============================================================================
// Resilient Fetcher
// ============================================================================

/// Runs provider operations under a [`FetchPolicy`].
///
/// This is the only place retry logic lives; callers never loop on their
/// own.
#[derive(Debug, Clone)]
pub struct ResilientFetcher {
    policy: FetchPolicy,
}

impl ResilientFetcher {
    pub fn new(policy: FetchPolicy) -> Self {
        Self { policy }
    }

    pub fn with_defaults() -> Self {
        Self::new(FetchPolicy::default())
    }

    /// Run `op` with bounded retries.
    ///
    /// Transient errors back off and retry until the policy is exhausted,
    /// then yield `Absent`. Shape errors return `Fault` on the spot. This
    /// function never returns an `Err` to the caller.
    pub async fn fetch<T, F, Fut>(&self, op_name: &str, mut op: F) -> FetchOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        for attempt in 0..self.policy.max_attempts {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            op = op_name,
                            attempt = attempt + 1,
                            "Provider recovered after retries"
                        );
                    }
                    return FetchOutcome::Data(value);
                }
                Err(e) if !e.is_transient() => {
                    tracing::warn!(op = op_name, error = %e, "Provider payload defective");
                    return FetchOutcome::Fault(e);
                }
                Err(e) => {
                    if attempt + 1 < self.policy.max_attempts {
                        let delay = self.policy.backoff_delay(attempt);
                        tracing::warn!(
                            op = op_name,
                            attempt = attempt + 1,
                            max_attempts = self.policy.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Provider call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        tracing::warn!(
                            op = op_name,
                            attempts = self.policy.max_attempts,
                            error = %e,
                            "Provider retries exhausted, treating as no data"
                        );
                    }
                }
            }
        }

        FetchOutcome::Absent
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> FetchPolicy {
        FetchPolicy {
            max_attempts,
            base_backoff_ms: 1,
            max_backoff_ms: 4,
        }
    }

    /// Operation that fails transiently until `fail_until` calls have been made.
    fn flaky_op(
        calls: Arc<AtomicUsize>,
        fail_until: usize,
    ) -> impl FnMut() -> std::future::Ready<Result<u32, ProviderError>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= fail_until {
                std::future::ready(Err(ProviderError::Network("flaky".into())))
            } else {
                std::future::ready(Ok(42))
            }
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = ResilientFetcher::new(fast_policy(3));

        let outcome = fetcher.fetch("op", flaky_op(Arc::clone(&calls), 0)).await;
        assert_eq!(outcome.data(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = ResilientFetcher::new(fast_policy(3));

        let outcome = fetcher.fetch("op", flaky_op(Arc::clone(&calls), 2)).await;
        assert_eq!(outcome.data(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_yields_absent_not_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = ResilientFetcher::new(fast_policy(3));

        let outcome = fetcher
            .fetch("op", flaky_op(Arc::clone(&calls), usize::MAX))
            .await;
        assert!(outcome.is_absent());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn shape_error_faults_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = ResilientFetcher::new(fast_policy(3));

        let counter = Arc::clone(&calls);
        let outcome: FetchOutcome<u32> = fetcher
            .fetch("op", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(ProviderError::DataShape("bad diff".into())))
            })
            .await;

        assert!(matches!(
            outcome,
            FetchOutcome::Fault(ProviderError::DataShape(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_with_attempts() {
        let policy = FetchPolicy {
            max_attempts: 5,
            base_backoff_ms: 100,
            max_backoff_ms: 10_000,
        };

        assert_eq!(policy.backoff_delay(0).as_millis(), 100);
        assert_eq!(policy.backoff_delay(1).as_millis(), 200);
        assert_eq!(policy.backoff_delay(2).as_millis(), 400);
    }

    #[test]
    fn backoff_caps_at_max() {
        let policy = FetchPolicy {
            max_attempts: 5,
            base_backoff_ms: 100,
            max_backoff_ms: 500,
        };

        assert_eq!(policy.backoff_delay(20).as_millis(), 500);
    }

    #[test]
    fn default_policy_round_trips_json() {
        let policy = FetchPolicy::default();
        let json = serde_json::to_string(&policy).unwrap();
        let parsed: FetchPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.max_attempts, policy.max_attempts);
        assert_eq!(parsed.base_backoff_ms, policy.base_backoff_ms);
    }
}
