//! Storage Module
//!
//! The in-memory backend and everything it is built from:
//!
//! - [`backend`]: the [`KvBackend`] contract a dispatcher programs against
//! - [`engine`]: [`RamStore`], the sharded implementation
//! - [`entry`]: the expiry-tagged record and its `<expiry>;<payload>` encoding
//! - [`glob`]: pattern matching for `scan`
//! - [`expiry`]: an opt-in background sweeper
//!
//! ## Expiry Policy
//!
//! Expiry is lazy. An expired entry is removed only when `get` reaches it or
//! the key is deleted; until then it still counts towards `size()`. Callers
//! that want memory back sooner can start an [`ExpirySweeper`].
//!
//! ## Example
//!
//! ```
//! use ramkv::storage::{KvBackend, RamStore};
//! use bytes::Bytes;
//!
//! let store = RamStore::open("").unwrap();
//!
//! store.set(Bytes::from("session"), Bytes::from("token123"), 3_600_000).unwrap();
//! assert!(store.ttl(&Bytes::from("session")) > 3_500);
//! ```

pub mod backend;
pub mod engine;
pub mod entry;
pub mod expiry;
pub mod glob;

// Re-export commonly used types
pub use backend::{KvBackend, ScanOptions, ScanPage, TtlStatus, TTL_MISSING, TTL_NO_EXPIRY};
pub use engine::{RamStore, StorageStats};
pub use entry::Entry;
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
