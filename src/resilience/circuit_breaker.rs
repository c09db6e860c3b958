//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast
//! - Half-Open: testing if the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: after the open duration
//! Half-Open → Closed: probe call succeeds
//! Half-Open → Open: probe call fails
//! ```
//!
//! # Design Decisions
//! - One breaker per command name (route id unless configured)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering a recovering upstream)

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::response::Response;
use dashmap::DashMap;

use crate::resilience::{PolicyFailure, PrimaryCall, ResiliencePolicy};

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe is allowed.
    pub open_duration: Duration,
    /// Deadline of each protected call.
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(5),
            timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed { failures: u32 },
    Open { until: Instant },
    HalfOpen { probing: bool },
}

/// State machine of a single command.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    failure_threshold: u32,
    open_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState::Closed { failures: 0 }),
            failure_threshold: failure_threshold.max(1),
            open_duration,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> BreakerState {
        *self.lock()
    }

    /// Whether a call may proceed now.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        match *state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { until } => {
                if Instant::now() >= until {
                    *state = BreakerState::HalfOpen { probing: true };
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen { probing } => {
                if probing {
                    false
                } else {
                    *state = BreakerState::HalfOpen { probing: true };
                    true
                }
            }
        }
    }

    pub fn on_success(&self) {
        *self.lock() = BreakerState::Closed { failures: 0 };
    }

    pub fn on_failure(&self) {
        let mut state = self.lock();
        let open = BreakerState::Open {
            until: Instant::now() + self.open_duration,
        };
        *state = match *state {
            BreakerState::Closed { failures } if failures + 1 >= self.failure_threshold => open,
            BreakerState::Closed { failures } => BreakerState::Closed { failures: failures + 1 },
            BreakerState::HalfOpen { .. } | BreakerState::Open { .. } => open,
        };
    }
}

/// Bundled [`ResiliencePolicy`]: a breaker per command plus a call deadline.
#[derive(Debug)]
pub struct CircuitBreakerPolicy {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerPolicy {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn breaker(&self, command: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(command.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    self.config.failure_threshold,
                    self.config.open_duration,
                ))
            })
            .clone()
    }
}

#[async_trait]
impl ResiliencePolicy for CircuitBreakerPolicy {
    async fn execute<'a>(&self, command: &str, primary: PrimaryCall<'a>) -> Result<Response, PolicyFailure> {
        let breaker = self.breaker(command);
        if !breaker.try_acquire() {
            tracing::debug!(command = %command, "Circuit open, short-circuiting");
            return Err(PolicyFailure::ShortCircuit);
        }

        match tokio::time::timeout(self.config.timeout, primary).await {
            Ok(Ok(response)) => {
                breaker.on_success();
                Ok(response)
            }
            Ok(Err(e)) => {
                breaker.on_failure();
                tracing::warn!(command = %command, error = %e, "Protected call failed");
                Err(PolicyFailure::CommandException(e))
            }
            Err(_) => {
                breaker.on_failure();
                tracing::warn!(command = %command, timeout = ?self.config.timeout, "Protected call timed out");
                Err(PolicyFailure::Timeout(self.config.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    use crate::error::GatewayError;

    fn policy(threshold: u32, open: Duration) -> CircuitBreakerPolicy {
        CircuitBreakerPolicy::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            open_duration: open,
            timeout: Duration::from_millis(50),
        })
    }

    fn ok() -> PrimaryCall<'static> {
        Box::pin(async { Ok(Response::new(Body::empty())) })
    }

    fn failing() -> PrimaryCall<'static> {
        Box::pin(async { Err(GatewayError::UpstreamUnavailable("refused".into())) })
    }

    #[tokio::test]
    async fn test_opens_after_threshold() {
        let policy = policy(2, Duration::from_secs(60));
        assert!(matches!(
            policy.execute("cmd", failing()).await,
            Err(PolicyFailure::CommandException(_))
        ));
        assert!(policy.execute("cmd", failing()).await.is_err());
        assert!(matches!(
            policy.execute("cmd", ok()).await,
            Err(PolicyFailure::ShortCircuit)
        ));
        // Other commands are unaffected.
        assert!(policy.execute("other", ok()).await.is_ok());
    }

    #[tokio::test]
    async fn test_timeout() {
        let policy = policy(5, Duration::from_secs(60));
        let slow: PrimaryCall<'static> = Box::pin(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Response::new(Body::empty()))
        });
        assert!(matches!(
            policy.execute("cmd", slow).await,
            Err(PolicyFailure::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_half_open_single_probe() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.on_failure();
        assert!(!breaker.try_acquire());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(breaker.try_acquire());
        assert!(!breaker.try_acquire());

        breaker.on_success();
        assert_eq!(breaker.state(), BreakerState::Closed { failures: 0 });
    }

    #[test]
    fn test_failed_probe_reopens() {
        let breaker = CircuitBreaker::new(3, Duration::ZERO);
        for _ in 0..3 {
            breaker.on_failure();
        }
        assert!(breaker.try_acquire());
        breaker.on_failure();
        assert!(matches!(breaker.state(), BreakerState::Open { .. }));
    }
}
