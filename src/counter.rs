//! Expiring request counters.
//!
//! The duplicate-request throttle needs a key → count store whose entries
//! expire after a configured window. Production deployments plug in their own
//! cache behind [`RateCounter`]; [`MemoryCounter`] backs tests and
//! single-process installs.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Interface to an expiring key→count store.
#[async_trait]
pub trait RateCounter: Send + Sync {
    /// Increment `key` and return the post-increment count.
    ///
    /// A fresh entry starts at 1 and expires `window` after the increment
    /// that created it.
    async fn increment(&self, key: &str, window: Duration) -> u64;
}

struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

/// In-memory counter with lazy expiry.
#[derive(Default)]
pub struct MemoryCounter {
    entries: Mutex<HashMap<String, CounterEntry>>,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateCounter for MemoryCounter {
    async fn increment(&self, key: &str, window: Duration) -> u64 {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        // Opportunistic sweep keeps dead keys from accumulating.
        entries.retain(|_, entry| entry.expires_at > now);
        match entries.get_mut(key) {
            Some(entry) => {
                entry.count += 1;
                entry.count
            }
            None => {
                entries.insert(
                    key.to_string(),
                    CounterEntry {
                        count: 1,
                        expires_at: now + window,
                    },
                );
                1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn counts_within_window() {
        let counter = MemoryCounter::new();
        assert_eq!(counter.increment("a:unique", WINDOW).await, 1);
        assert_eq!(counter.increment("a:unique", WINDOW).await, 2);
        assert_eq!(counter.increment("a:unique", WINDOW).await, 3);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let counter = MemoryCounter::new();
        assert_eq!(counter.increment("a:unique", WINDOW).await, 1);
        assert_eq!(counter.increment("b:unique", WINDOW).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_resets_after_window() {
        let counter = MemoryCounter::new();
        assert_eq!(counter.increment("a:unique", WINDOW).await, 1);
        assert_eq!(counter.increment("a:unique", WINDOW).await, 2);

        tokio::time::advance(WINDOW + Duration::from_secs(1)).await;
        assert_eq!(counter.increment("a:unique", WINDOW).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn window_runs_from_first_increment() {
        let counter = MemoryCounter::new();
        counter.increment("a:unique", WINDOW).await;

        // Later increments do not refresh the expiry.
        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(counter.increment("a:unique", WINDOW).await, 2);

        tokio::time::advance(Duration::from_secs(101)).await;
        assert_eq!(counter.increment("a:unique", WINDOW).await, 1);
    }
}
