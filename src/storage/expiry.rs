//! Opt-in Background Expiry Sweeper
//!
//! [`RamStore`] only expires entries lazily. A key that expires and is never
//! read again keeps its memory until it is deleted. The sweeper is an
//! optional tokio task that calls [`RamStore::purge_expired`] periodically
//! for callers that want that memory back.
//!
//! The interval adapts: it halves (down to `min_interval`) when a large share
//! of entries turned out to be expired, and doubles (up to `max_interval`)
//! while nothing expires.

use crate::storage::RamStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Base interval between sweeps (default: 100ms)
    pub base_interval: Duration,

    /// Minimum interval between sweeps (default: 10ms)
    pub min_interval: Duration,

    /// Maximum interval between sweeps (default: 1s)
    pub max_interval: Duration,

    /// If this fraction of entries were expired, speed up sweeping
    pub speedup_threshold: f64,

    /// If this fraction of entries were expired, slow down sweeping
    pub slowdown_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
            slowdown_threshold: 0.01,
        }
    }
}

impl ExpiryConfig {
    /// Next interval given how many of `entries` a sweep removed.
    fn next_interval(&self, current: Duration, entries: u64, purged: u64) -> Duration {
        if entries == 0 {
            return current;
        }

        let rate = purged as f64 / entries as f64;
        if rate > self.speedup_threshold {
            (current / 2).max(self.min_interval)
        } else if rate < self.slowdown_threshold && purged == 0 {
            (current * 2).min(self.max_interval)
        } else {
            current
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the sweeper on the current tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use ramkv::storage::{ExpiryConfig, ExpirySweeper, RamStore};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(RamStore::new());
    /// let sweeper = ExpirySweeper::start(Arc::clone(&store), ExpiryConfig::default());
    ///
    /// // Dropping the handle stops the task
    /// drop(sweeper);
    /// ```
    pub fn start(store: Arc<RamStore>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(store, config, shutdown_rx));

        debug!("background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            debug!("background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    store: Arc<RamStore>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    trace!("expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let entries = store.len();
        let purged = store.purge_expired();
        let next = config.next_interval(interval, entries, purged);

        if purged > 0 {
            debug!(
                purged,
                remaining = entries.saturating_sub(purged),
                interval_ms = next.as_millis() as u64,
                "expired entries purged"
            );
        } else if next != interval {
            trace!(interval_ms = next.as_millis() as u64, "sweeper backing off");
        }

        interval = next;
    }
}

/// Starts the expiry sweeper with default configuration.
pub fn start_expiry_sweeper(store: Arc<RamStore>) -> ExpirySweeper {
    ExpirySweeper::start(store, ExpiryConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KvBackend;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_sweeper_purges_expired_keys() {
        let store = Arc::new(RamStore::new());

        for i in 0..10 {
            store
                .set(Bytes::from(format!("key{}", i)), Bytes::from("value"), 50)
                .unwrap();
        }
        store
            .set(Bytes::from("persistent"), Bytes::from("value"), 0)
            .unwrap();

        assert_eq!(store.len(), 11);

        let config = ExpiryConfig {
            base_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let _sweeper = ExpirySweeper::start(Arc::clone(&store), config);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.ttl(&Bytes::from("persistent")), -1);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let store = Arc::new(RamStore::new());

        let config = ExpiryConfig {
            base_interval: Duration::from_millis(10),
            ..Default::default()
        };

        {
            let _sweeper = ExpirySweeper::start(Arc::clone(&store), config);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        store
            .set(Bytes::from("key"), Bytes::from("value"), 10)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        // Nobody swept it, so it is still physically there
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_next_interval() {
        let config = ExpiryConfig::default();
        let base = config.base_interval;

        assert_eq!(config.next_interval(base, 0, 0), base);
        assert_eq!(config.next_interval(base, 100, 50), base / 2);
        assert_eq!(config.next_interval(base, 100, 0), base * 2);
        assert_eq!(config.next_interval(base, 100, 10), base);

        assert_eq!(
            config.next_interval(config.min_interval, 10, 10),
            config.min_interval
        );
        assert_eq!(
            config.next_interval(config.max_interval, 10, 0),
            config.max_interval
        );
    }
}
