//! Flood protection for "Access denied" notices
//!
//! When an allow-list is configured, users outside it get one notice per
//! cooldown window; further attempts inside the window are silenced.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tracks which unauthorized users were recently told they have no access
#[derive(Clone)]
pub struct UnauthorizedCache {
    /// user_id -> () with the cooldown as time-to-live
    cache: Cache<i64, ()>,
    cooldown: Duration,
    silenced_count: Arc<AtomicU64>,
}

impl UnauthorizedCache {
    /// Creates a cache whose entries expire after `cooldown_secs`
    ///
    /// # Examples
    ///
    /// ```
    /// use oxide_relay::bot::UnauthorizedCache;
    ///
    /// let cache = UnauthorizedCache::new(
    ///     1200,   // 20 minutes cooldown
    ///     10_000  // max 10k entries
    /// );
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, max_capacity: u64) -> Self {
        let cooldown = Duration::from_secs(cooldown_secs);
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(cooldown)
            .build();

        Self {
            cache,
            cooldown,
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether an "Access denied" notice should be sent to the user now.
    ///
    /// Only every 100th silenced attempt is logged.
    pub async fn should_send(&self, user_id: i64, user_name: &str) -> bool {
        if self.cache.get(&user_id).await.is_none() {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count.is_multiple_of(100) {
            debug!(
                "⛔️ Silenced {} unauthorized attempts (recent: user {} - {})",
                count, user_id, user_name
            );
        }

        false
    }

    /// Starts the cooldown window after a notice was delivered
    pub async fn mark_sent(&self, user_id: i64) {
        self.cache.insert(user_id, ()).await;
    }

    /// Total number of silenced attempts
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }

    /// Configured cooldown window
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_attempt_should_send() {
        let cache = UnauthorizedCache::new(60, 100);
        assert!(cache.should_send(12345, "TestUser").await);
    }

    #[tokio::test]
    async fn test_cooldown_blocks_second_attempt() {
        let cache = UnauthorizedCache::new(60, 100);

        assert!(cache.should_send(12345, "TestUser").await);
        cache.mark_sent(12345).await;

        assert!(!cache.should_send(12345, "TestUser").await);
    }

    #[tokio::test]
    async fn test_different_users_independent() {
        let cache = UnauthorizedCache::new(60, 100);

        cache.mark_sent(111).await;
        assert!(cache.should_send(222, "User2").await);
    }

    #[tokio::test]
    async fn test_silenced_count_increments() {
        let cache = UnauthorizedCache::new(60, 100);
        cache.mark_sent(12345).await;

        for _ in 0..5 {
            cache.should_send(12345, "TestUser").await;
        }

        assert_eq!(cache.silenced_count(), 5);
        assert_eq!(cache.cooldown(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_cooldown_expires() {
        let cache = UnauthorizedCache::new(1, 100);
        cache.mark_sent(7).await;
        assert!(!cache.should_send(7, "User").await);

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(cache.should_send(7, "User").await);
    }
}
