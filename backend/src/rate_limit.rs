use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Client count past which expired windows are dropped.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Fixed-window request counter keyed by client address.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    max_clients: usize,
    clients: DashMap<String, (AtomicU32, Instant)>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        RateLimiter {
            max_requests,
            window,
            max_clients: MAX_TRACKED_CLIENTS,
            clients: DashMap::new(),
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Counts one request for `client`; false once the window budget is spent.
    pub fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now())
    }

    fn allow_at(&self, client: &str, now: Instant) -> bool {
        // Must run before `entry` below; retain locks every shard.
        if self.clients.len() >= self.max_clients {
            self.prune(now);
        }

        let mut entry = self
            .clients
            .entry(client.to_string())
            .or_insert_with(|| (AtomicU32::new(0), now));

        if now.duration_since(entry.1) > self.window {
            entry.0.store(0, Ordering::Relaxed);
            entry.1 = now;
        }

        let count = entry.0.fetch_add(1, Ordering::Relaxed);
        count < self.max_requests
    }

    fn prune(&self, now: Instant) {
        let window = self.window;
        self.clients
            .retain(|_, (_, start)| now.duration_since(*start) <= window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_per_client() {
        let limiter = RateLimiter::per_minute(2);
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.2"));
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.allow_at("client", start));
        assert!(!limiter.allow_at("client", start + Duration::from_secs(30)));
        assert!(limiter.allow_at("client", start + Duration::from_secs(61)));
    }

    #[test]
    fn expired_clients_are_dropped_past_the_cap() {
        let limiter = RateLimiter {
            max_clients: 2,
            ..RateLimiter::per_minute(5)
        };
        let start = Instant::now();
        assert!(limiter.allow_at("a", start));
        assert!(limiter.allow_at("b", start + Duration::from_secs(50)));
        assert_eq!(limiter.tracked_clients(), 2);

        // "a" has expired by now, "b" is still inside its window.
        assert!(limiter.allow_at("c", start + Duration::from_secs(70)));
        assert_eq!(limiter.tracked_clients(), 2);
        assert!(!limiter.clients.contains_key("a"));
        assert!(limiter.clients.contains_key("b"));
    }

    #[test]
    fn live_clients_survive_pruning() {
        let limiter = RateLimiter {
            max_clients: 1,
            ..RateLimiter::new(1, Duration::from_secs(60))
        };
        let start = Instant::now();
        assert!(limiter.allow_at("a", start));
        assert!(limiter.allow_at("b", start + Duration::from_secs(10)));
        // "a" kept its spent budget through the prune.
        assert!(!limiter.allow_at("a", start + Duration::from_secs(20)));
    }

    #[test]
    fn zero_budget_rejects_everything() {
        let limiter = RateLimiter::per_minute(0);
        assert!(!limiter.allow("client"));
    }
}
