//! Sliding-window rate limiter
//!
//! Process-lifetime, in-memory state: a per-identity window of attempt
//! timestamps plus an independent violation counter that survives window
//! pruning and persists until explicitly reset. Everything resets on process
//! restart.
//!
//! Time-dependent operations have `*_at` variants taking an explicit `now`
//! so tests can advance the clock.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct IdentityState {
    attempts: VecDeque<Instant>,
    violations: u32,
}

impl IdentityState {
    /// Drop attempts that have aged out of the window
    fn prune(&mut self, window: Duration, now: Instant) {
        while let Some(oldest) = self.attempts.front() {
            if now.duration_since(*oldest) >= window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-identity attempt tracking with violation escalation counters
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: RwLock<HashMap<i64, IdentityState>>,
}

impl RateLimiter {
    /// Create a new, empty rate limiter
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt for the identity
    pub async fn record_attempt(&self, identity: i64) {
        self.record_attempt_at(identity, Instant::now()).await;
    }

    pub async fn record_attempt_at(&self, identity: i64, now: Instant) {
        let mut entries = self.entries.write().await;
        entries.entry(identity).or_default().attempts.push_back(now);
    }

    /// Prune the identity's window, then test whether the remaining attempt
    /// count has reached the limit
    pub async fn is_rate_limited(
        &self,
        identity: i64,
        max_attempts: usize,
        window: Duration,
    ) -> bool {
        self.is_rate_limited_at(identity, max_attempts, window, Instant::now())
            .await
    }

    pub async fn is_rate_limited_at(
        &self,
        identity: i64,
        max_attempts: usize,
        window: Duration,
        now: Instant,
    ) -> bool {
        let mut entries = self.entries.write().await;
        let Some(state) = entries.get_mut(&identity) else {
            return false;
        };
        state.prune(window, now);
        state.attempts.len() >= max_attempts
    }

    /// Time until the oldest in-window attempt ages out, i.e. how long the
    /// identity has to wait. None when the window is empty.
    pub async fn retry_after(&self, identity: i64, window: Duration) -> Option<Duration> {
        self.retry_after_at(identity, window, Instant::now()).await
    }

    pub async fn retry_after_at(
        &self,
        identity: i64,
        window: Duration,
        now: Instant,
    ) -> Option<Duration> {
        let entries = self.entries.read().await;
        let oldest = entries.get(&identity)?.attempts.front()?;
        window.checked_sub(now.duration_since(*oldest))
    }

    /// Count one more violation for the identity and return the new total
    pub async fn register_violation(&self, identity: i64) -> u32 {
        let mut entries = self.entries.write().await;
        let state = entries.entry(identity).or_default();
        state.violations += 1;
        state.violations
    }

    /// Forgive all recorded violations for the identity
    pub async fn reset_violations(&self, identity: i64) {
        let mut entries = self.entries.write().await;
        if let Some(state) = entries.get_mut(&identity) {
            state.violations = 0;
        }
    }

    /// Current violation count for the identity
    pub async fn violations(&self, identity: i64) -> u32 {
        let entries = self.entries.read().await;
        entries.get(&identity).map(|s| s.violations).unwrap_or(0)
    }

    /// Number of recorded (possibly stale) attempts for the identity
    pub async fn attempt_count(&self, identity: i64) -> usize {
        let entries = self.entries.read().await;
        entries.get(&identity).map(|s| s.attempts.len()).unwrap_or(0)
    }

    /// Evict identities with an aged-out window and no outstanding
    /// violations, so the map stays bounded in a long-lived process.
    /// Call periodically.
    pub async fn cleanup(&self, window: Duration) {
        self.cleanup_at(window, Instant::now()).await;
    }

    pub async fn cleanup_at(&self, window: Duration, now: Instant) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, state| {
            state.prune(window, now);
            !state.attempts.is_empty() || state.violations > 0
        });
        tracing::debug!(tracked = entries.len(), "Rate limiter cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(15 * 60);

    #[tokio::test]
    async fn test_limit_reached_within_window() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for _ in 0..4 {
            limiter.record_attempt_at(7, start).await;
        }
        assert!(!limiter.is_rate_limited_at(7, 5, WINDOW, start).await);

        limiter.record_attempt_at(7, start).await;
        assert!(limiter.is_rate_limited_at(7, 5, WINDOW, start).await);
    }

    #[tokio::test]
    async fn test_window_expiry_resets_limit() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for _ in 0..5 {
            limiter.record_attempt_at(7, start).await;
        }
        assert!(limiter.is_rate_limited_at(7, 5, WINDOW, start).await);

        // The whole window elapses; pruning clears every stale attempt.
        let later = start + WINDOW + Duration::from_secs(1);
        assert!(!limiter.is_rate_limited_at(7, 5, WINDOW, later).await);
        assert_eq!(limiter.attempt_count(7).await, 0);
    }

    #[tokio::test]
    async fn test_identities_tracked_separately() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for _ in 0..5 {
            limiter.record_attempt_at(1, start).await;
        }
        assert!(limiter.is_rate_limited_at(1, 5, WINDOW, start).await);
        assert!(!limiter.is_rate_limited_at(2, 5, WINDOW, start).await);
    }

    #[tokio::test]
    async fn test_retry_after_counts_down_from_oldest() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        limiter.record_attempt_at(7, start).await;
        let mid = start + Duration::from_secs(5 * 60);
        let left = limiter.retry_after_at(7, WINDOW, mid).await.unwrap();
        assert_eq!(left, Duration::from_secs(10 * 60));

        assert!(limiter.retry_after_at(42, WINDOW, mid).await.is_none());
    }

    #[tokio::test]
    async fn test_violations_independent_of_window() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        limiter.record_attempt_at(7, start).await;
        assert_eq!(limiter.register_violation(7).await, 1);
        assert_eq!(limiter.register_violation(7).await, 2);

        // Pruning the attempt window leaves the counter alone.
        let later = start + WINDOW + Duration::from_secs(1);
        assert!(!limiter.is_rate_limited_at(7, 5, WINDOW, later).await);
        assert_eq!(limiter.violations(7).await, 2);

        limiter.reset_violations(7).await;
        assert_eq!(limiter.violations(7).await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_evicts_idle_identities() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        limiter.record_attempt_at(1, start).await;
        limiter.record_attempt_at(2, start).await;
        limiter.register_violation(2).await;

        let later = start + WINDOW + Duration::from_secs(1);
        limiter.cleanup_at(WINDOW, later).await;

        // Identity 1 is gone; identity 2 kept its violation count.
        assert_eq!(limiter.attempt_count(1).await, 0);
        assert_eq!(limiter.violations(1).await, 0);
        assert_eq!(limiter.violations(2).await, 1);
    }
}
