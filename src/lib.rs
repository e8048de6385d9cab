//! # ramkv - A Volatile In-Memory Storage Backend
//!
//! `ramkv` is one interchangeable storage engine behind a key-value server.
//! It keeps string values in memory with optional per-key expiry and an
//! atomic integer increment. The command dispatcher, wire protocol and server
//! startup live elsewhere; they talk to this crate through [`KvBackend`].
//!
//! ## Features
//!
//! - **Sharded Storage**: 64 `RwLock`-guarded shards, so unrelated keys rarely contend
//! - **Lazy Expiry**: expired keys are dropped when `get` reaches them, no timers
//! - **Safe Increments**: `incr` holds its key's shard lock for the whole
//!   read-modify-write, so concurrent increments and writes never lose updates
//! - **Optional Sweeper**: a tokio task that reclaims expired entries on demand
//!
//! ## Quick Start
//!
//! ```
//! use ramkv::{KvBackend, RamStore, StoreError};
//! use bytes::Bytes;
//! use std::thread;
//! use std::time::Duration;
//!
//! let store = RamStore::open("unused").unwrap();
//!
//! store.set(Bytes::from("x"), Bytes::from("hello"), 0).unwrap();
//! assert_eq!(store.get(&Bytes::from("x")), Ok(Bytes::from("hello")));
//! assert_eq!(store.ttl(&Bytes::from("x")), -1);
//!
//! store.set(Bytes::from("y"), Bytes::from("5"), 100).unwrap();
//! thread::sleep(Duration::from_millis(200));
//! assert_eq!(store.get(&Bytes::from("y")), Err(StoreError::Expired));
//! assert_eq!(store.ttl(&Bytes::from("y")), -2);
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the store, its entry encoding, the backend contract and the sweeper
//! - [`error`]: [`StoreError`] and [`StoreResult`]

pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use error::{StoreError, StoreResult};
pub use storage::{
    start_expiry_sweeper, Entry, ExpiryConfig, ExpirySweeper, KvBackend, RamStore, ScanOptions,
    ScanPage, StorageStats, TtlStatus,
};

/// Version of ramkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
