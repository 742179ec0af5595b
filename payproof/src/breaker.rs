//! Per-chain circuit breaker around adapter calls.
//!
//! One breaker instance exists per chain, shared by every concurrent
//! caller to that chain. Calls pass through while the breaker is
//! `Closed`; after the failure threshold is reached within the sliding
//! window the breaker trips `Open` and fails fast without touching the
//! adapter; after a cooldown a single probe call is admitted
//! (`HalfOpen`), closing the breaker on success and re-opening it on
//! failure.
//!
//! Only infrastructure failures count: an [`AdapterError::Unavailable`]
//! or an enforced call timeout. A transaction that simply does not exist
//! is evidence the chain is healthy and clears the failure window.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::transfer::AdapterError;

/// Circuit breaker tuning parameters.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Number of counted failures within [`BreakerConfig::window`] that
    /// trips the breaker open.
    pub failure_threshold: u32,
    /// Sliding window over which failures are counted.
    pub window: Duration,
    /// Time spent `Open` before a probe is admitted.
    pub cooldown: Duration,
    /// Enforced timeout per adapter call; an elapsed timeout counts as a
    /// failure.
    pub call_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(300),
            cooldown: Duration::from_secs(60),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Observable breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation, calls pass through.
    Closed,
    /// Failing; calls are rejected without contacting the adapter.
    Open,
    /// Cooldown elapsed; a single probe call is in flight or admissible.
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: Vec<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// A shared, per-chain circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a breaker for the named chain.
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: Vec::new(),
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Returns the current breaker state.
    ///
    /// # Panics
    ///
    /// Panics if the state mutex is poisoned.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker mutex poisoned").state
    }

    /// Runs an adapter call through the breaker with the configured
    /// timeout enforced.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Unavailable`] immediately when the breaker
    /// is open, on call timeout, or propagates the adapter's own error.
    pub async fn call<T, F>(&self, fut: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        let probe = self.admit()?;

        let outcome = tokio::time::timeout(self.config.call_timeout, fut).await;
        match outcome {
            Ok(Ok(value)) => {
                self.on_success(probe);
                Ok(value)
            }
            Ok(Err(err)) if err.is_retryable() => {
                self.on_failure(probe);
                Err(err)
            }
            Ok(Err(err)) => {
                // The chain answered; a business-level outcome is proof of
                // health, not a fault.
                self.on_success(probe);
                Err(err)
            }
            Err(_) => {
                self.on_failure(probe);
                Err(AdapterError::Unavailable(format!(
                    "call timed out after {:?}",
                    self.config.call_timeout
                )))
            }
        }
    }

    /// Decides whether a call may proceed. Returns whether the admitted
    /// call is the half-open probe.
    fn admit(&self) -> Result<bool, AdapterError> {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        match inner.state {
            BreakerState::Closed => Ok(false),
            BreakerState::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.cooldown);
                if cooled_down {
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::info!(breaker = %self.name, "circuit breaker half-open, probing");
                    Ok(true)
                } else {
                    Err(AdapterError::Unavailable(format!(
                        "circuit breaker open for {}",
                        self.name
                    )))
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(AdapterError::Unavailable(format!(
                        "circuit breaker open for {}",
                        self.name
                    )))
                } else {
                    inner.probe_in_flight = true;
                    Ok(true)
                }
            }
        }
    }

    fn on_success(&self, probe: bool) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        inner.failures.clear();
        if probe {
            inner.probe_in_flight = false;
            inner.opened_at = None;
            if inner.state != BreakerState::Closed {
                tracing::info!(breaker = %self.name, "circuit breaker closed");
            }
            inner.state = BreakerState::Closed;
        }
    }

    fn on_failure(&self, probe: bool) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        if probe {
            inner.probe_in_flight = false;
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
            tracing::warn!(breaker = %self.name, "probe failed, circuit breaker re-opened");
            return;
        }
        if inner.state != BreakerState::Closed {
            return;
        }
        let now = Instant::now();
        let window = self.config.window;
        inner.failures.retain(|at| now.duration_since(*at) < window);
        inner.failures.push(now);
        if inner.failures.len() >= self.config.failure_threshold as usize {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(now);
            inner.failures.clear();
            tracing::warn!(
                breaker = %self.name,
                threshold = self.config.failure_threshold,
                "failure threshold reached, circuit breaker opened"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            window: Duration::from_secs(300),
            cooldown: Duration::from_secs(60),
            call_timeout: Duration::from_secs(5),
        }
    }

    async fn fail(calls: &AtomicU32) -> Result<u32, AdapterError> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(AdapterError::Unavailable("rpc down".into()))
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_fails_fast() {
        let breaker = CircuitBreaker::new("eip155:8453", config());
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let _ = breaker.call(fail(&calls)).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // The next call must be rejected without invoking the adapter.
        let result = breaker.call(fail(&calls)).await;
        assert!(matches!(result, Err(AdapterError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_does_not_count() {
        let breaker = CircuitBreaker::new("eip155:1", config());
        for _ in 0..10 {
            let result: Result<u32, _> = breaker.call(async { Err(AdapterError::NotFound) }).await;
            assert!(matches!(result, Err(AdapterError::NotFound)));
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_success_resets_the_failure_window() {
        let breaker = CircuitBreaker::new("eip155:1", config());
        let calls = AtomicU32::new(0);

        let _ = breaker.call(fail(&calls)).await;
        let _ = breaker.call(fail(&calls)).await;
        let _ = breaker.call(async { Ok(7u32) }).await;
        let _ = breaker.call(fail(&calls)).await;
        let _ = breaker.call(fail(&calls)).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_admits_a_single_probe() {
        let breaker = CircuitBreaker::new("solana:mainnet", config());
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let _ = breaker.call(fail(&calls)).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(61)).await;

        // Failed probe goes straight back to open.
        let _ = breaker.call(fail(&calls)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(breaker.state(), BreakerState::Open);

        // A fresh cooldown must elapse before the next probe.
        let result = breaker.call(fail(&calls)).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        tokio::time::advance(Duration::from_secs(61)).await;
        let result = breaker.call(async { Ok(1u32) }).await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_probe_in_flight() {
        let breaker = Arc::new(CircuitBreaker::new("eip155:8453", config()));
        let calls = AtomicU32::new(0);
        for _ in 0..3 {
            let _ = breaker.call(fail(&calls)).await;
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        let gate = Arc::new(tokio::sync::Notify::new());
        let probe = {
            let breaker = Arc::clone(&breaker);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                breaker
                    .call(async move {
                        gate.notified().await;
                        Ok(42u32)
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        // Concurrent call while the probe is in flight is rejected.
        let result = breaker.call(async { Ok(0u32) }).await;
        assert!(result.is_err());

        gate.notify_one();
        assert_eq!(probe.await.unwrap().unwrap(), 42);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let breaker = CircuitBreaker::new("eip155:1", config());
        for _ in 0..3 {
            let result: Result<u32, _> = breaker.call(std::future::pending()).await;
            assert!(matches!(result, Err(AdapterError::Unavailable(_))));
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
