//! The storage-engine contract.
//!
//! A command dispatcher talks to storage only through [`KvBackend`], so
//! backends can be swapped without touching the command layer.

use crate::error::StoreResult;
use bytes::Bytes;
use std::time::Duration;

/// `ttl` code for a key that is absent or logically expired.
pub const TTL_MISSING: i64 = -2;

/// `ttl` code for a key that never expires.
pub const TTL_NO_EXPIRY: i64 = -1;

/// Default number of keys a scan call tries to return.
pub const DEFAULT_SCAN_COUNT: usize = 10;

/// Typed view of a key's remaining lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    /// The key is absent or expired
    Missing,
    /// The key exists and never expires
    NoExpiry,
    /// The key exists and expires after the given duration
    ExpiresIn(Duration),
}

impl TtlStatus {
    /// Converts to the integer reply: `-2`, `-1`, or whole seconds left.
    ///
    /// Remaining time is rounded up, so a live key always reports at least 1.
    pub fn as_secs_code(&self) -> i64 {
        match self {
            TtlStatus::Missing => TTL_MISSING,
            TtlStatus::NoExpiry => TTL_NO_EXPIRY,
            TtlStatus::ExpiresIn(left) => left.as_millis().div_ceil(1000) as i64,
        }
    }
}

/// Cursor, pattern and batch size for [`KvBackend::scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Where to resume; 0 starts a new iteration
    pub cursor: u64,
    /// Optional glob pattern (`*`, `?`, `[...]`, `\` escapes)
    pub pattern: Option<String>,
    /// Hint for how many keys to return; 0 means [`DEFAULT_SCAN_COUNT`]
    pub count: usize,
}

impl ScanOptions {
    /// Options that match every key from the start.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the scan to keys matching `pattern`.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Sets the batch size hint.
    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Resumes from a cursor returned by a previous call.
    pub fn cursor(mut self, cursor: u64) -> Self {
        self.cursor = cursor;
        self
    }
}

/// One batch of scan results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call, or 0 when the iteration is complete
    pub cursor: u64,
    /// Live keys found in this batch
    pub keys: Vec<Bytes>,
}

/// Operations every storage engine exposes to the dispatcher.
pub trait KvBackend: Send + Sync {
    /// Opens the backend at `location`.
    fn open(location: &str) -> StoreResult<Self>
    where
        Self: Sized;

    /// Stores `value` under `key`; a positive `ttl_ms` sets an expiry.
    fn set(&self, key: Bytes, value: Bytes, ttl_ms: i64) -> StoreResult<()>;

    /// Fetches the value stored under `key`.
    fn get(&self, key: &Bytes) -> StoreResult<Bytes>;

    /// Stores every pair without expiry.
    fn mset(&self, pairs: &[(Bytes, Bytes)]) -> StoreResult<()>;

    /// Fetches several keys; failed lookups come back empty.
    fn mget(&self, keys: &[Bytes]) -> Vec<Bytes>;

    /// Removes keys; absent keys are ignored.
    fn del(&self, keys: &[Bytes]) -> StoreResult<()>;

    /// Remaining lifetime as a `-2` / `-1` / seconds code.
    fn ttl(&self, key: &Bytes) -> i64;

    /// Adds `by` to the integer stored under `key` and returns the result.
    fn incr(&self, key: &Bytes, by: i64) -> StoreResult<i64>;

    /// Approximate footprint in bytes.
    fn size(&self) -> i64;

    /// Reclaims space held by dead entries.
    fn gc(&self) -> StoreResult<()>;

    /// Iterates over keys in batches.
    fn scan(&self, options: &ScanOptions) -> StoreResult<ScanPage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_codes() {
        assert_eq!(TtlStatus::Missing.as_secs_code(), -2);
        assert_eq!(TtlStatus::NoExpiry.as_secs_code(), -1);
        assert_eq!(
            TtlStatus::ExpiresIn(Duration::from_millis(100)).as_secs_code(),
            1
        );
        assert_eq!(
            TtlStatus::ExpiresIn(Duration::from_millis(2000)).as_secs_code(),
            2
        );
        assert_eq!(
            TtlStatus::ExpiresIn(Duration::from_millis(2001)).as_secs_code(),
            3
        );
    }

    #[test]
    fn test_scan_options_builder() {
        let opts = ScanOptions::new().pattern("user:*").count(50).cursor(3);
        assert_eq!(opts.pattern.as_deref(), Some("user:*"));
        assert_eq!(opts.count, 50);
        assert_eq!(opts.cursor, 3);
    }
}
