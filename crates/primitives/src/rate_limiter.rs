//! Fixed-window request limiter backing the per-client HTTP throttle.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// Fixed-window limiter holding one window per client key.
///
/// Each key gets `capacity` acquisitions per `period`. Windows are created
/// lazily on a key's first request and expired windows are pruned on every
/// acquisition, so the map stays bounded by the set of clients active
/// within one period.
#[derive(Clone, Debug)]
pub struct RateLimiter<K> {
    windows: Arc<Mutex<HashMap<K, Window>>>,
    capacity: u64,
    period: Duration,
}

#[derive(Debug)]
struct Window {
    used: u64,
    expires_at: Instant,
}

impl<K: Eq + Hash> RateLimiter<K> {
    /// Create a limiter allowing `capacity` acquisitions per `period` for
    /// each distinct key.
    pub fn new(capacity: u64, period: Duration) -> Self {
        Self { windows: Arc::new(Mutex::new(HashMap::new())), capacity, period }
    }

    /// Attempt to take one permit from `key`'s current window.
    pub fn try_acquire(&self, key: K) -> bool {
        let mut windows = self.windows.lock().expect("lock poisoned");
        let now = Instant::now();
        windows.retain(|_, window| now < window.expires_at);

        let window = windows
            .entry(key)
            .or_insert_with(|| Window { used: 0, expires_at: now + self.period });
        if window.used < self.capacity {
            window.used += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RateLimiter;
    use std::{
        net::{IpAddr, Ipv4Addr},
        time::Duration,
    };
    use tokio::time::sleep;

    const FIRST: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const SECOND: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[tokio::test]
    async fn budget_is_per_client() {
        let limiter = RateLimiter::new(1, Duration::from_secs(30));
        assert!(limiter.try_acquire(FIRST));
        // the second client has its own window
        assert!(limiter.try_acquire(SECOND));
        assert!(!limiter.try_acquire(FIRST));
        assert!(!limiter.try_acquire(SECOND));
    }

    #[tokio::test]
    async fn a_burst_is_capped_within_one_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(30));
        let granted = (0..10).filter(|_| limiter.try_acquire(FIRST)).count();
        assert_eq!(granted, 3);
    }

    #[tokio::test]
    async fn expired_windows_grant_a_fresh_budget() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        assert!(limiter.try_acquire(FIRST));
        assert!(!limiter.try_acquire(FIRST));

        sleep(Duration::from_millis(15)).await;
        assert!(limiter.try_acquire(FIRST));
        assert!(limiter.try_acquire(SECOND));
    }
}
