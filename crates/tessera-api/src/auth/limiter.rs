//! Authentication failure limiting.
//!
//! Failed logins are counted per key (username + tenant slug) in a fixed
//! window; once the limit is hit, further attempts for that key are refused
//! until the window rolls over. Successful login clears the key.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct FailureBucket {
    count: u32,
    window_start: Instant,
}

pub struct AuthFailureLimiter {
    buckets: Mutex<HashMap<String, FailureBucket>>,
    limit: u32,
    window: Duration,
}

impl AuthFailureLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            limit: limit.max(1),
            window,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, FailureBucket>> {
        // A poisoned limiter must not lock everyone out.
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_blocked(&self, key: &str) -> bool {
        let mut buckets = self.lock();
        match buckets.get(key) {
            Some(bucket) if bucket.window_start.elapsed() < self.window => {
                bucket.count >= self.limit
            }
            Some(_) => {
                buckets.remove(key);
                false
            }
            None => false,
        }
    }

    pub fn record_failure(&self, key: &str) {
        let mut buckets = self.lock();
        let now = Instant::now();
        let bucket = buckets.entry(key.to_string()).or_insert(FailureBucket {
            count: 0,
            window_start: now,
        });
        if bucket.window_start.elapsed() >= self.window {
            bucket.count = 0;
            bucket.window_start = now;
        }
        bucket.count += 1;
    }

    pub fn clear(&self, key: &str) {
        self.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit_and_clears_on_success() {
        let limiter = AuthFailureLimiter::new(3, Duration::from_secs(60));
        let key = "acme/alice";

        for _ in 0..2 {
            limiter.record_failure(key);
            assert!(!limiter.is_blocked(key));
        }
        limiter.record_failure(key);
        assert!(limiter.is_blocked(key));

        limiter.clear(key);
        assert!(!limiter.is_blocked(key));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = AuthFailureLimiter::new(1, Duration::from_secs(60));
        limiter.record_failure("acme/alice");
        assert!(limiter.is_blocked("acme/alice"));
        assert!(!limiter.is_blocked("acme/bob"));
    }

    #[test]
    fn window_rollover_unblocks() {
        let limiter = AuthFailureLimiter::new(1, Duration::from_millis(10));
        limiter.record_failure("k");
        assert!(limiter.is_blocked("k"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!limiter.is_blocked("k"));
    }
}
