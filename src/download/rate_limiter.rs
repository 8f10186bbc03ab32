//! Process-wide token-bucket rate limiting for outbound requests.
//!
//! This module provides the [`RateLimiter`] struct. One instance is built at
//! startup, wrapped in `Arc`, and handed to every component that talks to the
//! network, so registry lookups, mirror queries, downloads and citation
//! fetches all draw from the same bucket.
//!
//! # Overview
//!
//! The bucket starts full (`capacity` tokens) and refills continuously at
//! `per_second` tokens per second. [`RateLimiter::take`] never fails: when the
//! bucket is empty the caller reserves the next token and sleeps until it has
//! been refilled. Reservations are made under the lock, so waiting callers are
//! released in arrival order.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bibfetch_core::download::RateLimiter;
//!
//! # async fn example() {
//! // 50 requests per second, burst of 50
//! let limiter = Arc::new(RateLimiter::new(50));
//!
//! // Each outbound request takes one token first
//! limiter.take().await;
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Warning threshold for cumulative limiter delay across the run (30 seconds).
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Shared token bucket gating every outbound request.
///
/// `RateLimiter` is `Send + Sync`; share it with `Arc::clone` across spawned
/// Tokio tasks. The bucket state sits behind a `tokio::sync::Mutex` that is
/// held only while refilling and reserving, never across the sleep.
#[derive(Debug)]
pub struct RateLimiter {
    /// Refill rate in tokens per second.
    per_second: u32,

    /// Bucket capacity (maximum burst).
    capacity: u32,

    /// Whether rate limiting is disabled (for `--rate-limit 0`).
    disabled: bool,

    /// Bucket contents and refill clock.
    bucket: Mutex<Bucket>,

    /// Total time callers have spent waiting (in milliseconds).
    cumulative_delay_ms: AtomicU64,
}

#[derive(Debug)]
struct Bucket {
    /// Available tokens. Negative when callers hold reservations.
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, per_second: f64, capacity: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * per_second).min(capacity);
        self.last_refill = now;
    }
}

impl RateLimiter {
    /// Creates a limiter refilling `per_second` tokens per second with an equal burst capacity.
    ///
    /// A rate of 0 builds a disabled limiter.
    ///
    /// # Example
    ///
    /// ```
    /// use bibfetch_core::download::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(50);
    /// assert_eq!(limiter.capacity(), 50);
    /// assert!(RateLimiter::new(0).is_disabled());
    /// ```
    #[must_use]
    pub fn new(per_second: u32) -> Self {
        Self::with_capacity(per_second, per_second)
    }

    /// Creates a limiter with an explicit burst capacity (at least 1).
    #[must_use]
    #[instrument]
    pub fn with_capacity(per_second: u32, capacity: u32) -> Self {
        if per_second == 0 {
            return Self::disabled();
        }
        let capacity = capacity.max(1);
        debug!("creating token-bucket rate limiter");
        Self {
            per_second,
            capacity,
            disabled: false,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            }),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Creates a disabled rate limiter whose [`take`](Self::take) returns immediately.
    #[must_use]
    #[instrument]
    pub fn disabled() -> Self {
        debug!("creating disabled rate limiter");
        Self {
            per_second: 0,
            capacity: 0,
            disabled: true,
            bucket: Mutex::new(Bucket {
                tokens: 0.0,
                last_refill: Instant::now(),
            }),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Returns whether rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Refill rate in tokens per second (0 when disabled).
    #[must_use]
    pub fn per_second(&self) -> u32 {
        self.per_second
    }

    /// Bucket capacity (0 when disabled).
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Total time callers have waited on this limiter so far.
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        Duration::from_millis(self.cumulative_delay_ms.load(Ordering::Relaxed))
    }

    /// Takes one token, waiting until one is available.
    ///
    /// Never rejects; excess callers are delayed.
    pub async fn take(&self) {
        if self.disabled {
            return;
        }

        let per_second = f64::from(self.per_second);
        let delay = {
            let mut bucket = self.bucket.lock().await;
            bucket.refill(Instant::now(), per_second, f64::from(self.capacity));
            bucket.tokens -= 1.0;
            if bucket.tokens >= 0.0 {
                None
            } else {
                Some(Duration::from_secs_f64(-bucket.tokens / per_second))
            }
        };

        if let Some(delay) = delay {
            let cumulative = self.add_cumulative_delay(delay);
            debug!(
                delay_ms = delay.as_millis(),
                cumulative_ms = cumulative.as_millis(),
                "applying rate limit delay"
            );
            if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                warn!(
                    cumulative_delay_secs = cumulative.as_secs(),
                    "excessive rate limiting - consider a higher --rate-limit or fewer identifiers"
                );
            }
            tokio::time::sleep(delay).await;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let new_total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(new_total)
    }
}
