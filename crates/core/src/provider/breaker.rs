//! Circuit breaker for provider calls.
//!
//! Three states: CLOSED (calls pass, failures counted in a rolling
//! window), OPEN (calls fail fast for a reset timeout), HALF_OPEN (one
//! trial call allowed; success closes, failure reopens). State is
//! process-local and Mutex-protected; the breaker holds no financial
//! state.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::ProviderError;

/// Circuit breaker tuning.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Failures within the window that trip the breaker.
    pub failure_threshold: u32,
    /// Rolling window in which failures are counted.
    pub window: Duration,
    /// How long the breaker stays open before a half-open trial.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(60),
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Observable breaker state, for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through.
    Closed,
    /// Calls fail fast.
    Open,
    /// One trial call allowed.
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug)]
enum State {
    Closed,
    Open { since: Instant },
    HalfOpen { trial_in_flight: bool },
}

#[derive(Debug)]
struct Inner {
    state: State,
    failures: VecDeque<Instant>,
}

/// A process-local circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a breaker in the closed state.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                failures: VecDeque::new(),
            }),
        }
    }

    /// Asks permission to attempt a call.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::CircuitOpen` while the breaker is open or
    /// while a half-open trial is already in flight.
    pub fn try_acquire(&self) -> Result<(), ProviderError> {
        let mut inner = self.lock();
        match inner.state {
            State::Closed => Ok(()),
            State::Open { since } => {
                if since.elapsed() >= self.config.reset_timeout {
                    inner.state = State::HalfOpen {
                        trial_in_flight: true,
                    };
                    Ok(())
                } else {
                    Err(ProviderError::CircuitOpen)
                }
            }
            State::HalfOpen { trial_in_flight } => {
                if trial_in_flight {
                    Err(ProviderError::CircuitOpen)
                } else {
                    inner.state = State::HalfOpen {
                        trial_in_flight: true,
                    };
                    Ok(())
                }
            }
        }
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.failures.clear();
        inner.state = State::Closed;
    }

    /// Records a failed call, possibly tripping the breaker.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.lock();

        match inner.state {
            State::HalfOpen { .. } => {
                // Trial failed: straight back to open.
                inner.failures.clear();
                inner.state = State::Open { since: now };
            }
            State::Closed => {
                inner.failures.push_back(now);
                let window = self.config.window;
                while inner
                    .failures
                    .front()
                    .is_some_and(|first| now.duration_since(*first) > window)
                {
                    inner.failures.pop_front();
                }
                if inner.failures.len() >= self.config.failure_threshold as usize {
                    inner.failures.clear();
                    inner.state = State::Open { since: now };
                }
            }
            State::Open { .. } => {}
        }
    }

    /// Current observable state.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        match self.lock().state {
            State::Closed => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means another caller panicked mid-update;
        // breaker state stays usable.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            window: Duration::from_secs(60),
            reset_timeout: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_starts_closed_and_allows_calls() {
        let breaker = CircuitBreaker::new(fast_config());
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn test_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(fast_config());
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(matches!(
            breaker.try_acquire(),
            Err(ProviderError::CircuitOpen)
        ));
    }

    #[test]
    fn test_success_clears_failure_window() {
        let breaker = CircuitBreaker::new(fast_config());
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn test_half_open_allows_single_trial() {
        let breaker = CircuitBreaker::new(fast_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(30));

        // First caller gets the trial, second is rejected.
        assert!(breaker.try_acquire().is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(matches!(
            breaker.try_acquire(),
            Err(ProviderError::CircuitOpen)
        ));
    }

    #[test]
    fn test_trial_success_closes() {
        let breaker = CircuitBreaker::new(fast_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        breaker.try_acquire().unwrap();
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn test_trial_failure_reopens() {
        let breaker = CircuitBreaker::new(fast_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        breaker.try_acquire().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(matches!(
            breaker.try_acquire(),
            Err(ProviderError::CircuitOpen)
        ));
    }
}
