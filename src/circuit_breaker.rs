//! # Circuit Breaker Module
//!
//! Stops sending report images to the OCR engine after repeated failures and
//! lets a trial request through once the reset timeout has elapsed.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::ocr_config::RecoveryConfig;

/// Observable breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge value exported as `circuit_breaker_state`
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 0.5,
            CircuitState::Open => 1.0,
        }
    }
}

#[derive(Debug, Default)]
struct BreakerInner {
    failure_count: u32,
    last_failure_time: Option<Instant>,
    /// A half-open trial request has been admitted and not yet reported
    trial_in_flight: bool,
}

/// Circuit breaker shared by every OCR worker.
///
/// ```text
/// CLOSED ──failures ≥ threshold──► OPEN ──reset timeout──► HALF-OPEN
///   ▲                                                        │
///   └──────────────────success───────────────────────────────┘
///                     failure in HALF-OPEN ⇒ OPEN again
/// ```
///
/// Both counters live behind one lock so a check never sees a count from one
/// failure and a timestamp from another.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    config: RecoveryConfig,
}

impl CircuitBreaker {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            inner: Mutex::new(BreakerInner::default()),
            config,
        }
    }

    /// Current state without side effects
    pub fn state(&self) -> CircuitState {
        self.state_of(&self.inner.lock())
    }

    fn state_of(&self, inner: &BreakerInner) -> CircuitState {
        if inner.failure_count < self.config.circuit_breaker_threshold {
            return CircuitState::Closed;
        }
        match inner.last_failure_time {
            Some(last) if last.elapsed() < self.reset_timeout() => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    /// Returns `true` when a new request would be rejected: the breaker is open,
    /// or it is half-open and its single trial request is still running.
    pub fn is_open(&self) -> bool {
        let inner = self.inner.lock();
        let state = self.state_of(&inner);
        metrics::gauge!("circuit_breaker_state").set(state.as_gauge());
        match state {
            CircuitState::Closed => false,
            CircuitState::Open => true,
            CircuitState::HalfOpen => inner.trial_in_flight,
        }
    }

    /// Admit one request.
    ///
    /// Always admits while closed and never while open. In the half-open state
    /// exactly one caller is admitted as the trial; everyone else is rejected
    /// until that trial is reported through [`record_success`](Self::record_success)
    /// or [`record_failure`](Self::record_failure).
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        let state = self.state_of(&inner);
        metrics::gauge!("circuit_breaker_state").set(state.as_gauge());
        match state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen if inner.trial_in_flight => false,
            CircuitState::HalfOpen => {
                inner.trial_in_flight = true;
                tracing::info!("OCR circuit breaker half-open, admitting trial request");
                true
            }
        }
    }

    /// Record a failed OCR attempt
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_time = Some(Instant::now());
        inner.trial_in_flight = false;
        if inner.failure_count == self.config.circuit_breaker_threshold {
            tracing::warn!(
                failure_count = inner.failure_count,
                reset_secs = self.config.circuit_breaker_reset_secs,
                "OCR circuit breaker opened"
            );
        }
    }

    /// Record a successful OCR attempt, closing the breaker
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.failure_count >= self.config.circuit_breaker_threshold {
            tracing::info!("OCR circuit breaker closed after successful trial request");
        }
        inner.failure_count = 0;
        inner.last_failure_time = None;
        inner.trial_in_flight = false;
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.config.circuit_breaker_reset_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(RecoveryConfig {
            circuit_breaker_threshold: threshold,
            circuit_breaker_reset_secs: 60,
            ..Default::default()
        })
    }

    #[test]
    fn test_opens_at_threshold() {
        let cb = breaker(3);
        assert!(!cb.is_open());
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert!(cb.is_open());
        assert_eq!(cb.failure_count(), 3);
    }

    #[test]
    fn test_success_closes() {
        let cb = breaker(1);
        cb.record_failure();
        assert!(cb.is_open());
        cb.record_success();
        assert!(!cb.is_open());
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_half_open_after_timeout() {
        let cb = breaker(1);
        cb.record_failure();
        cb.inner.lock().last_failure_time = Some(Instant::now() - Duration::from_secs(61));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.is_open());

        // trial request fails: open again
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_half_open_admits_a_single_trial() {
        let cb = breaker(1);
        cb.record_failure();
        cb.inner.lock().last_failure_time = Some(Instant::now() - Duration::from_secs(61));

        assert!(cb.try_acquire());
        assert!(!cb.try_acquire());
        assert!(!cb.try_acquire());
        assert!(cb.is_open());

        cb.record_success();
        assert!(cb.try_acquire());
        assert!(cb.try_acquire());
    }

    #[test]
    fn test_failed_trial_reopens_then_allows_next_trial() {
        let cb = breaker(1);
        cb.record_failure();
        cb.inner.lock().last_failure_time = Some(Instant::now() - Duration::from_secs(61));
        assert!(cb.try_acquire());

        cb.record_failure();
        assert!(!cb.try_acquire());

        cb.inner.lock().last_failure_time = Some(Instant::now() - Duration::from_secs(61));
        assert!(cb.try_acquire());
    }
}
