//! Per-IP fixed window rate limiting.
//!
//! Each client IP owns one window holding a request count and a reset
//! instant. A request after the reset instant opens a fresh window; a
//! request inside a full window is rejected without touching the count.
//!
//! Windows live in a `DashMap`. The entry guard holds the shard lock for
//! the whole read-increment-write, so concurrent requests for one IP can
//! never jointly exceed the limit.
//!
//! State is process-local and lost on restart. Multi-instance deployments
//! need a shared store behind the [`RateLimiter`] trait.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::RateLimitConfig;

/// Time source for window bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("manual clock mutex poisoned");
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().expect("manual clock mutex poisoned")
    }
}

/// Rate limiting seam. Call sites only see this trait, so the in-memory
/// limiter can be replaced by a shared backing store.
pub trait RateLimiter: Send + Sync {
    /// Record a request from `ip`. Returns `false` if it must be rejected.
    fn check(&self, ip: &str) -> bool;

    /// Value advertised in `Retry-After` on rejection.
    fn retry_after(&self) -> Duration;

    /// Number of clients with a live window.
    fn tracked_clients(&self) -> usize;

    /// Drop expired windows. Returns how many were removed.
    fn cleanup(&self) -> usize;
}

/// Build the limiter described by the configuration.
pub fn from_config(config: &RateLimitConfig) -> Arc<dyn RateLimiter> {
    if config.enabled {
        Arc::new(FixedWindowLimiter::new(
            config.max_requests,
            Duration::from_secs(config.window_secs),
        ))
    } else {
        Arc::new(Unlimited::new(Duration::from_secs(config.window_secs)))
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
}

impl RateWindow {
    fn open(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now + window,
        }
    }
}

/// In-memory fixed window limiter keyed by client IP.
pub struct FixedWindowLimiter {
    windows: DashMap<String, RateWindow>,
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_clock(limit, window, Arc::new(SystemClock))
    }

    pub fn with_clock(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window,
            clock,
        }
    }

    /// Current count for `ip`, if it has a window (expired or not).
    pub fn count(&self, ip: &str) -> Option<u32> {
        self.windows.get(ip).map(|w| w.count)
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, ip: &str) -> bool {
        let now = self.clock.now();

        match self.windows.entry(ip.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(RateWindow::open(now, self.window));
                true
            }
            Entry::Occupied(mut slot) => {
                let window = slot.get_mut();
                if now > window.reset_at {
                    *window = RateWindow::open(now, self.window);
                    true
                } else if window.count < self.limit {
                    window.count += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn retry_after(&self) -> Duration {
        self.window
    }

    fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, w| now <= w.reset_at);
        before.saturating_sub(self.windows.len())
    }
}

/// Limiter used when rate limiting is disabled.
#[derive(Debug)]
pub struct Unlimited {
    retry_after: Duration,
}

impl Unlimited {
    pub fn new(retry_after: Duration) -> Self {
        Self { retry_after }
    }
}

impl RateLimiter for Unlimited {
    fn check(&self, _ip: &str) -> bool {
        true
    }

    fn retry_after(&self) -> Duration {
        self.retry_after
    }

    fn tracked_clients(&self) -> usize {
        0
    }

    fn cleanup(&self) -> usize {
        0
    }
}

/// Periodically sweep expired windows until shutdown.
pub async fn run_cleanup(
    limiter: Arc<dyn RateLimiter>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.cleanup();
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.tracked_clients(), "Expired rate windows swept");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, clock: Arc<ManualClock>) -> FixedWindowLimiter {
        FixedWindowLimiter::with_clock(limit, Duration::from_secs(900), clock)
    }

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(3, clock);

        assert!(limiter.check("1.1.1.1"));
        assert!(limiter.check("1.1.1.1"));
        assert!(limiter.check("1.1.1.1"));
        assert!(!limiter.check("1.1.1.1"));
        assert!(!limiter.check("1.1.1.1"));

        // Rejections do not push the count past the limit.
        assert_eq!(limiter.count("1.1.1.1"), Some(3));
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(2, clock.clone());

        assert!(limiter.check("1.1.1.1"));
        assert!(limiter.check("1.1.1.1"));
        assert!(!limiter.check("1.1.1.1"));

        // Exactly at reset_at the window is still live.
        clock.advance(Duration::from_secs(900));
        assert!(!limiter.check("1.1.1.1"));

        clock.advance(Duration::from_millis(1));
        assert!(limiter.check("1.1.1.1"));
        assert_eq!(limiter.count("1.1.1.1"), Some(1));
    }

    #[test]
    fn test_clients_are_independent() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(1, clock);

        assert!(limiter.check("1.1.1.1"));
        assert!(!limiter.check("1.1.1.1"));
        assert!(limiter.check("2.2.2.2"));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_cleanup_drops_expired_windows() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(5, clock.clone());

        limiter.check("1.1.1.1");
        clock.advance(Duration::from_secs(600));
        limiter.check("2.2.2.2");
        clock.advance(Duration::from_secs(301));

        assert_eq!(limiter.cleanup(), 1);
        assert_eq!(limiter.count("1.1.1.1"), None);
        assert_eq!(limiter.count("2.2.2.2"), Some(1));
    }

    #[test]
    fn test_no_overshoot_under_concurrency() {
        let limiter = Arc::new(FixedWindowLimiter::new(50, Duration::from_secs(900)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..25).filter(|_| limiter.check("9.9.9.9")).count())
            })
            .collect();

        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, 50);
        assert_eq!(limiter.count("9.9.9.9"), Some(50));
    }

    #[test]
    fn test_disabled_config_never_rejects() {
        let config = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        let limiter = from_config(&config);
        assert!((0..1000).all(|_| limiter.check("1.1.1.1")));
        assert_eq!(limiter.retry_after(), Duration::from_secs(900));
    }
}
