//! Volatile, sharded key-value store with lazy expiry.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Keys hash onto 64 shards, each guarded by its own `RwLock`.
//! 2. **Lazy Expiry**: An expired entry stays in its shard until `get` touches it
//!    or it is deleted. `ttl` reports it as missing but leaves it in place.
//! 3. **Per-Shard Mutation**: `set`, `del`, lazy eviction and `incr` all take the
//!    key's shard write lock. `incr` holds it across its read-modify-write, so an
//!    increment can neither lose nor clobber a concurrent write to the same key,
//!    while keys in other shards proceed in parallel.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        RamStore                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Multi-key operations (`mset`, `mget`, `del`) visit keys one at a time and
//! are not atomic as a batch.

use crate::error::{StoreError, StoreResult};
use crate::storage::backend::{KvBackend, ScanOptions, ScanPage, TtlStatus, DEFAULT_SCAN_COUNT};
use crate::storage::entry::{now_millis, Entry};
use crate::storage::glob::Glob;
use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, trace};

/// Number of shards for the store.
/// More shards = less lock contention, but more memory overhead.
const NUM_SHARDS: usize = 64;

/// A single shard containing a portion of the key-value pairs.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<Bytes, Entry>>,
}

impl Shard {
    // A writer that panicked cannot leave a half-inserted entry behind,
    // so the map is still usable after poisoning.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Bytes, Entry>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Bytes, Entry>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The in-memory storage backend.
///
/// Wrap it in an `Arc` to share it between threads or tasks; every
/// operation takes `&self`.
///
/// # Example
///
/// ```
/// use ramkv::{KvBackend, RamStore, StoreError};
/// use bytes::Bytes;
///
/// let store = RamStore::open("").unwrap();
///
/// store.set(Bytes::from("name"), Bytes::from("Ariz"), 0).unwrap();
/// assert_eq!(store.get(&Bytes::from("name")), Ok(Bytes::from("Ariz")));
/// assert_eq!(store.ttl(&Bytes::from("name")), -1);
///
/// assert_eq!(store.incr(&Bytes::from("hits"), 3), Ok(3));
/// assert_eq!(store.get(&Bytes::from("missing")), Err(StoreError::NotFound));
/// ```
pub struct RamStore {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: total DEL operations
    del_count: AtomicU64,

    /// Statistics: total INCR operations
    incr_count: AtomicU64,

    /// Statistics: number of expired keys removed
    expired_count: AtomicU64,
}

impl std::fmt::Debug for RamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RamStore")
            .field("shards", &self.shards.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .field("incr_count", &self.incr_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for RamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RamStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            incr_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    /// Gets the shard for a given key.
    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Releases the store and everything in it.
    pub fn close(self) -> StoreResult<()> {
        debug!(keys = self.len(), "closing ram store");
        Ok(())
    }

    /// Returns the typed remaining lifetime of a key.
    ///
    /// Unlike `get`, this never removes an expired entry.
    pub fn ttl_status(&self, key: &Bytes) -> TtlStatus {
        let now = now_millis();
        let data = self.get_shard(key).read();

        match data.get(key) {
            None => TtlStatus::Missing,
            Some(entry) if entry.is_expired_at(now) => TtlStatus::Missing,
            Some(entry) => match entry.remaining_ms(now) {
                None => TtlStatus::NoExpiry,
                Some(ms) => TtlStatus::ExpiresIn(Duration::from_millis(ms)),
            },
        }
    }

    /// Returns the number of physically present entries, expired ones included.
    pub fn len(&self) -> u64 {
        self.shards.iter().map(|s| s.read().len() as u64).sum()
    }

    /// Returns true if no entries are physically present.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }

    /// Removes every logically expired entry from all shards.
    ///
    /// This is what the optional background sweeper runs; the store never
    /// calls it on its own.
    ///
    /// # Returns
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> u64 {
        let now = now_millis();
        let mut purged = 0u64;

        for shard in &self.shards {
            let mut data = shard.write();
            let before = data.len();
            data.retain(|_, entry| !entry.is_expired_at(now));
            purged += (before - data.len()) as u64;
        }

        if purged > 0 {
            self.expired_count.fetch_add(purged, Ordering::Relaxed);
        }

        purged
    }

    /// Returns operation counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len(),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            incr_ops: self.incr_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

impl KvBackend for RamStore {
    /// The location is accepted for parity with disk-backed engines and ignored.
    fn open(location: &str) -> StoreResult<Self> {
        debug!(location, "opening ram store; location is unused");
        Ok(Self::new())
    }

    fn set(&self, key: Bytes, value: Bytes, ttl_ms: i64) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let entry = Entry::with_ttl_ms(value, ttl_ms, now_millis());
        trace!(key = ?key, ttl_ms, expires_at = ?entry.expires_at, "set");
        self.get_shard(&key).write().insert(key, entry);
        Ok(())
    }

    /// Returns `Expired` (and removes the entry) once its expiry has passed.
    fn get(&self, key: &Bytes) -> StoreResult<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(key);

        // Fast path: read lock for live or absent keys
        {
            let data = shard.read();
            match data.get(key) {
                None => return Err(StoreError::NotFound),
                Some(entry) if !entry.is_expired() => return Ok(entry.payload.clone()),
                Some(_) => {}
            }
        }

        // Expired - take the write lock and re-check before evicting
        let mut data = shard.write();
        match data.get(key) {
            None => return Err(StoreError::NotFound),
            // Another writer replaced it in between
            Some(entry) if !entry.is_expired() => return Ok(entry.payload.clone()),
            Some(_) => {}
        }

        data.remove(key);
        self.expired_count.fetch_add(1, Ordering::Relaxed);
        trace!(key = ?key, "lazily evicted expired key");
        Err(StoreError::Expired)
    }

    fn mset(&self, pairs: &[(Bytes, Bytes)]) -> StoreResult<()> {
        for (key, value) in pairs {
            self.set(key.clone(), value.clone(), 0)?;
        }
        Ok(())
    }

    fn mget(&self, keys: &[Bytes]) -> Vec<Bytes> {
        keys.iter()
            .map(|key| self.get(key).unwrap_or_default())
            .collect()
    }

    fn del(&self, keys: &[Bytes]) -> StoreResult<()> {
        for key in keys {
            self.del_count.fetch_add(1, Ordering::Relaxed);
            let existed = self.get_shard(key).write().remove(key).is_some();
            trace!(key = ?key, existed, "del");
        }
        Ok(())
    }

    fn ttl(&self, key: &Bytes) -> i64 {
        self.ttl_status(key).as_secs_code()
    }

    /// Missing, expired and non-integer values all count as 0. The result is
    /// written back without expiry.
    fn incr(&self, key: &Bytes, by: i64) -> StoreResult<i64> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        self.incr_count.fetch_add(1, Ordering::Relaxed);

        let now = now_millis();
        let mut data = self.get_shard(key).write();

        let current = match data.get(key) {
            Some(entry) if !entry.is_expired_at(now) => parse_counter(&entry.payload),
            _ => 0,
        };

        let next = current.checked_add(by).ok_or(StoreError::Overflow)?;
        data.insert(key.clone(), Entry::new(Bytes::from(next.to_string())));
        trace!(key = ?key, by, value = next, "incr");

        Ok(next)
    }

    /// Sums key and encoded entry lengths over every physically present entry.
    fn size(&self) -> i64 {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .read()
                    .iter()
                    .map(|(key, entry)| (key.len() + entry.encoded_len()) as i64)
                    .sum::<i64>()
            })
            .sum()
    }

    /// Nothing to collect: expiry is lazy and memory is released on removal.
    fn gc(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Walks whole shards from `options.cursor` until at least `count` live
    /// matching keys are gathered. Expired entries are skipped, not removed.
    fn scan(&self, options: &ScanOptions) -> StoreResult<ScanPage> {
        let start = options.cursor as usize;
        if start >= NUM_SHARDS {
            return Ok(ScanPage::default());
        }

        let count = if options.count == 0 {
            DEFAULT_SCAN_COUNT
        } else {
            options.count
        };
        let glob = options
            .pattern
            .as_deref()
            .map(Glob::new)
            .filter(|g| !g.is_match_all());

        let now = now_millis();
        let mut keys = Vec::new();
        let mut index = start;

        while index < NUM_SHARDS && keys.len() < count {
            let data = self.shards[index].read();
            keys.extend(
                data.iter()
                    .filter(|(_, entry)| !entry.is_expired_at(now))
                    .filter(|(key, _)| glob.as_ref().map_or(true, |g| g.matches(key)))
                    .map(|(key, _)| key.clone()),
            );
            index += 1;
        }

        let cursor = if index >= NUM_SHARDS { 0 } else { index as u64 };
        Ok(ScanPage { cursor, keys })
    }
}

/// Parses a stored counter, treating anything non-numeric as 0.
fn parse_counter(payload: &[u8]) -> i64 {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0)
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of physically present entries
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total DEL operations (per key)
    pub del_ops: u64,
    /// Total INCR operations
    pub incr_ops: u64,
    /// Total expired entries removed
    pub expired: u64,
}
