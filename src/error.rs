//! Error types for the storage backend.

use thiserror::Error;

/// Errors returned by [`RamStore`](crate::storage::RamStore) operations.
///
/// Only `get` surfaces `NotFound` and `Expired`; the bulk and counter
/// operations absorb both and treat the key as empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The key is not present.
    #[error("key not found")]
    NotFound,

    /// The key was present but its expiry had passed. The entry has been removed.
    #[error("key expired")]
    Expired,

    /// Keys must be non-empty.
    #[error("key must not be empty")]
    EmptyKey,

    /// An increment would leave the `i64` range.
    #[error("increment would overflow")]
    Overflow,

    /// A serialized entry could not be decoded.
    #[error("corrupt entry: {0}")]
    Corrupt(String),
}

/// Convenience alias used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(StoreError::NotFound.to_string(), "key not found");
        assert_eq!(
            StoreError::Corrupt("missing separator".into()).to_string(),
            "corrupt entry: missing separator"
        );
    }
}
