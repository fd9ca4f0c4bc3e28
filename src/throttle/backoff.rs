//! Exponential backoff between retry attempts
//!
//! The delay starts at the initial value and doubles after every retryable
//! outcome. When doubling would pass the ceiling the delay either wraps back
//! to the initial value (the default) or stays at the ceiling.

use crate::types::BackoffOverflow;
use std::time::Duration;

/// Default first delay
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Default ceiling
pub const BACKOFF_CEILING: Duration = Duration::from_secs(60);

/// Shape of the backoff sequence, shared by every dispatch of a throttler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    initial: Duration,
    ceiling: Duration,
    overflow: BackoffOverflow,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF, BACKOFF_CEILING, BackoffOverflow::Wrap)
    }
}

impl BackoffPolicy {
    /// Create a policy; a ceiling below `initial` is raised to `initial`
    pub fn new(initial: Duration, ceiling: Duration, overflow: BackoffOverflow) -> Self {
        Self {
            initial,
            ceiling: ceiling.max(initial),
            overflow,
        }
    }

    /// First delay
    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// Largest delay ever returned
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Overflow behaviour
    pub fn overflow(&self) -> BackoffOverflow {
        self.overflow
    }

    /// Fresh per-call counter
    pub fn start(&self) -> Backoff {
        Backoff {
            policy: *self,
            current: self.initial,
        }
    }
}

/// Per-call backoff counter
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    /// Delay the next retry would wait
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Return the delay to wait now and move on to the next one
    pub fn advance(&mut self) -> Duration {
        let delay = self.current;
        let doubled = self.current.saturating_mul(2);
        self.current = if doubled > self.policy.ceiling {
            match self.policy.overflow {
                BackoffOverflow::Wrap => self.policy.initial,
                BackoffOverflow::Cap => self.policy.ceiling,
            }
        } else {
            doubled
        };
        delay
    }
}
