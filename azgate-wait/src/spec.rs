//! Wait parameters: state classification, timeout and poll interval policy.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

/// Default overall timeout for a wait (10 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default fixed interval between polls (5 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Errors building a [`WaitSpec`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    #[error("target state '{0}' is also listed as pending")]
    TargetIsPending(String),

    #[error("timeout must be positive")]
    ZeroTimeout,

    #[error("poll interval must be positive")]
    ZeroInterval,

    #[error("backoff multiplier must be at least 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("maximum interval {max:?} is shorter than the first interval {initial:?}")]
    MaxBelowInitial { initial: Duration, max: Duration },
}

/// Interval policy between consecutive polls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    multiplier: f64,
    max: Duration,
}

impl Backoff {
    /// Same interval between every poll.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial: interval,
            multiplier: 1.0,
            max: interval,
        }
    }

    /// Interval grows by `multiplier` after every poll, capped at `max`.
    pub fn exponential(initial: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            initial,
            multiplier,
            max,
        }
    }

    /// Interval before the first re-poll.
    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// Interval to sleep after `completed` sleeps have already happened.
    pub fn interval(&self, completed: u32) -> Duration {
        let exp = i32::try_from(completed).unwrap_or(i32::MAX);
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exp);
        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    fn validate(&self) -> Result<(), SpecError> {
        if self.initial.is_zero() {
            return Err(SpecError::ZeroInterval);
        }
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(SpecError::InvalidMultiplier(self.multiplier));
        }
        if self.max < self.initial {
            return Err(SpecError::MaxBelowInitial {
                initial: self.initial,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::fixed(DEFAULT_POLL_INTERVAL)
    }
}

/// How an observed state relates to a [`WaitSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Target,
    Pending,
    Other,
}

/// Parameters for a single wait. Always valid once built.
#[derive(Debug, Clone)]
pub struct WaitSpec {
    target: String,
    pending: HashSet<String>,
    timeout: Duration,
    backoff: Backoff,
    initial_delay: Duration,
}

impl WaitSpec {
    pub fn builder(target: impl Into<String>) -> WaitSpecBuilder {
        WaitSpecBuilder {
            target: target.into(),
            pending: HashSet::new(),
            timeout: DEFAULT_TIMEOUT,
            backoff: Backoff::default(),
            initial_delay: Duration::ZERO,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn pending(&self) -> &HashSet<String> {
        &self.pending
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Classify an observed state label. Matching is exact.
    pub fn classify(&self, state: &str) -> StateClass {
        if state == self.target {
            StateClass::Target
        } else if self.pending.contains(state) {
            StateClass::Pending
        } else {
            StateClass::Other
        }
    }
}

/// Builder for [`WaitSpec`].
#[derive(Debug, Clone)]
pub struct WaitSpecBuilder {
    target: String,
    pending: HashSet<String>,
    timeout: Duration,
    backoff: Backoff,
    initial_delay: Duration,
}

impl WaitSpecBuilder {
    /// Add states that mean "still converging".
    pub fn pending<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending.extend(states.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fixed interval between polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.backoff = Backoff::fixed(interval);
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before the first poll. Counts against the timeout.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn build(self) -> Result<WaitSpec, SpecError> {
        if self.pending.contains(&self.target) {
            return Err(SpecError::TargetIsPending(self.target));
        }
        if self.timeout.is_zero() {
            return Err(SpecError::ZeroTimeout);
        }
        self.backoff.validate()?;

        Ok(WaitSpec {
            target: self.target,
            pending: self.pending,
            timeout: self.timeout,
            backoff: self.backoff,
            initial_delay: self.initial_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let spec = WaitSpec::builder("Succeeded")
            .pending(["Accepted", "Updating"])
            .build()
            .unwrap();

        assert_eq!(spec.classify("Succeeded"), StateClass::Target);
        assert_eq!(spec.classify("Accepted"), StateClass::Pending);
        assert_eq!(spec.classify("Updating"), StateClass::Pending);
        assert_eq!(spec.classify("Failed"), StateClass::Other);
        // Case matters: "succeeded" is a different label
        assert_eq!(spec.classify("succeeded"), StateClass::Other);
    }

    #[test]
    fn test_target_in_pending_rejected() {
        let err = WaitSpec::builder("Succeeded")
            .pending(["Accepted", "Succeeded"])
            .build()
            .unwrap_err();
        assert_eq!(err, SpecError::TargetIsPending("Succeeded".to_string()));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let err = WaitSpec::builder("Succeeded")
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err, SpecError::ZeroTimeout);

        let err = WaitSpec::builder("Succeeded")
            .poll_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err, SpecError::ZeroInterval);
    }

    #[test]
    fn test_invalid_backoff_rejected() {
        let err = WaitSpec::builder("Succeeded")
            .backoff(Backoff::exponential(
                Duration::from_secs(1),
                0.5,
                Duration::from_secs(10),
            ))
            .build()
            .unwrap_err();
        assert_eq!(err, SpecError::InvalidMultiplier(0.5));

        let err = WaitSpec::builder("Succeeded")
            .backoff(Backoff::exponential(
                Duration::from_secs(1),
                f64::NAN,
                Duration::from_secs(10),
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, SpecError::InvalidMultiplier(_)));

        let err = WaitSpec::builder("Succeeded")
            .backoff(Backoff::exponential(
                Duration::from_secs(5),
                2.0,
                Duration::from_secs(1),
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, SpecError::MaxBelowInitial { .. }));
    }

    #[test]
    fn test_defaults() {
        let spec = WaitSpec::builder("Succeeded").build().unwrap();
        assert_eq!(spec.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(spec.backoff(), Backoff::fixed(DEFAULT_POLL_INTERVAL));
        assert_eq!(spec.initial_delay(), Duration::ZERO);
        assert!(spec.pending().is_empty());
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::fixed(Duration::from_millis(250));
        for n in [0, 1, 5, 100] {
            assert_eq!(backoff.interval(n), Duration::from_millis(250));
        }
    }

    #[test]
    fn test_exponential_backoff_caps_at_max() {
        let backoff =
            Backoff::exponential(Duration::from_secs(1), 2.0, Duration::from_secs(10));
        assert_eq!(backoff.interval(0), Duration::from_secs(1));
        assert_eq!(backoff.interval(1), Duration::from_secs(2));
        assert_eq!(backoff.interval(2), Duration::from_secs(4));
        assert_eq!(backoff.interval(3), Duration::from_secs(8));
        assert_eq!(backoff.interval(4), Duration::from_secs(10));
        assert_eq!(backoff.interval(u32::MAX), Duration::from_secs(10));
    }
}
