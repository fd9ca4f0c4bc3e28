//! Rate gates
//!
//! A gate hands out permits ("slots") to start an attempt. One gate is
//! created per throttler and shared by every call going through it.
//!
//! - [`TickerGate`]: fixed-interval ticker, at most one permit buffered
//! - [`TokenBucketGate`]: token bucket using governor, configurable burst

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Source of permits to start an attempt
#[async_trait]
pub trait RateGate: Send + Sync {
    /// Wait for the next permit.
    ///
    /// Must be cancel safe: dropping the future before it completes must
    /// not use up a permit.
    async fn acquire(&self);

    /// Nominal time between two permits
    fn interval(&self) -> Duration;
}

#[async_trait]
impl<G: RateGate + ?Sized> RateGate for Arc<G> {
    async fn acquire(&self) {
        (**self).acquire().await;
    }

    fn interval(&self) -> Duration {
        (**self).interval()
    }
}

// ============================================================================
// Ticker
// ============================================================================

/// Fixed-interval ticker.
///
/// Ticks are anchored at construction: the first permit is issued one
/// interval later and then one per interval. Ticks nobody waits for are
/// dropped, so an idle gate never hands out more than one permit at once.
pub struct TickerGate {
    period: Duration,
    start: Instant,
    // built on first use so construction works outside a runtime
    ticker: Mutex<Option<Interval>>,
}

impl TickerGate {
    /// Create a ticker emitting one permit per `period`
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_nanos(1));
        Self {
            period,
            start: Instant::now(),
            ticker: Mutex::new(None),
        }
    }

    /// Create a ticker for a requests-per-second rate
    pub fn per_second(requests_per_second: u32) -> Self {
        Self::new(Duration::from_secs(1) / requests_per_second.max(1))
    }
}

#[async_trait]
impl RateGate for TickerGate {
    async fn acquire(&self) {
        let mut slot = self.ticker.lock().await;
        let ticker = slot.get_or_insert_with(|| {
            let mut ticker = interval_at(self.start + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        ticker.tick().await;
    }

    fn interval(&self) -> Duration {
        self.period
    }
}

impl std::fmt::Debug for TickerGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerGate")
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Token Bucket
// ============================================================================

/// Token bucket gate
#[derive(Clone)]
pub struct TokenBucketGate {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
    period: Duration,
}

impl TokenBucketGate {
    /// Create a bucket replenishing one token per `period`, holding up to `burst`
    pub fn new(period: Duration, burst: u32) -> Self {
        let period = period.max(Duration::from_nanos(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: Arc::new(Governor::direct(quota)),
            period,
        }
    }

    /// Create a bucket for a requests-per-second rate
    pub fn per_second(requests_per_second: u32, burst: u32) -> Self {
        Self::new(Duration::from_secs(1) / requests_per_second.max(1), burst)
    }

    /// Try to take a token without waiting
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

#[async_trait]
impl RateGate for TokenBucketGate {
    async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    fn interval(&self) -> Duration {
        self.period
    }
}

impl std::fmt::Debug for TokenBucketGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucketGate")
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}
