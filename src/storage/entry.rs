//! Stored values and their boundary encoding.
//!
//! Inside the store an [`Entry`] is a plain two-field record. The flat
//! `<expires_at>;<payload>` form only exists at the edges: it is what
//! [`Entry::encode`] produces, what [`Entry::decode`] accepts, and what
//! `size()` accounts for through [`Entry::encoded_len`].
//!
//! Expiry instants are absolute Unix timestamps in milliseconds, capped at
//! `i64::MAX` so every encoded expiry parses back. An encoded expiry of `0`
//! (or anything negative) means the entry never expires.
//!
//! The store itself never decodes: entries live in memory as structs.
//! [`Entry::decode`] and [`StoreError::Corrupt`] exist for callers outside the
//! crate that ship or persist the encoded form and need to read it back.

use crate::error::{StoreError, StoreResult};
use bytes::{BufMut, Bytes, BytesMut};
use std::time::{SystemTime, UNIX_EPOCH};

/// Separator between the expiry field and the payload in the encoded form.
pub const SEPARATOR: u8 = b';';

/// Latest representable expiry; the encoded field is read back as `i64`.
const MAX_EXPIRES_AT: u64 = i64::MAX as u64;

/// Returns the current wall-clock time as Unix milliseconds.
#[inline]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A stored value with an optional absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// When this entry expires, in Unix milliseconds (None = never expires)
    pub expires_at: Option<u64>,
    /// The value as supplied by the caller
    pub payload: Bytes,
}

impl Entry {
    /// Creates an entry without expiry.
    pub fn new(payload: Bytes) -> Self {
        Self {
            expires_at: None,
            payload,
        }
    }

    /// Creates an entry that expires `ttl_ms` milliseconds after `now_ms`.
    ///
    /// A non-positive `ttl_ms` yields an entry that never expires.
    pub fn with_ttl_ms(payload: Bytes, ttl_ms: i64, now_ms: u64) -> Self {
        let expires_at = if ttl_ms > 0 {
            Some(now_ms.saturating_add(ttl_ms as u64).min(MAX_EXPIRES_AT))
        } else {
            None
        };

        Self {
            expires_at,
            payload,
        }
    }

    /// Checks if this entry is logically expired at `now_ms`.
    #[inline]
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at.map(|exp| now_ms >= exp).unwrap_or(false)
    }

    /// Checks if this entry is logically expired right now.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Remaining lifetime in milliseconds, or None if the entry never expires.
    ///
    /// Saturates at zero once the expiry has passed.
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expires_at.map(|exp| exp.saturating_sub(now_ms))
    }

    /// Length in bytes of [`Entry::encode`]'s output, without allocating.
    pub fn encoded_len(&self) -> usize {
        decimal_len(self.expires_at.unwrap_or(0)) + 1 + self.payload.len()
    }

    /// Serializes the entry as `<expires_at>;<payload>`.
    pub fn encode(&self) -> Bytes {
        let expiry = self.expires_at.unwrap_or(0).to_string();

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_slice(expiry.as_bytes());
        buf.put_u8(SEPARATOR);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parses the `<expires_at>;<payload>` form.
    ///
    /// Only the first separator is significant, so payloads may contain `;`.
    pub fn decode(raw: &[u8]) -> StoreResult<Self> {
        let split = raw
            .iter()
            .position(|&b| b == SEPARATOR)
            .ok_or_else(|| StoreError::Corrupt("missing separator".to_string()))?;

        let expiry = std::str::from_utf8(&raw[..split])
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| StoreError::Corrupt("expiry is not an integer".to_string()))?;

        Ok(Self {
            expires_at: (expiry > 0).then_some(expiry as u64),
            payload: Bytes::copy_from_slice(&raw[split + 1..]),
        })
    }
}

/// Number of digits in the decimal rendering of `n`.
#[inline]
fn decimal_len(n: u64) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_ttl_never_expires() {
        let now = now_millis();
        assert_eq!(Entry::with_ttl_ms(Bytes::from("v"), 0, now).expires_at, None);
        assert_eq!(Entry::with_ttl_ms(Bytes::from("v"), -1, now).expires_at, None);

        let entry = Entry::new(Bytes::from("v"));
        assert!(!entry.is_expired_at(u64::MAX));
        assert_eq!(entry.remaining_ms(now), None);
    }

    #[test]
    fn test_expiry_boundary() {
        let entry = Entry::with_ttl_ms(Bytes::from("v"), 1500, 10_000);
        assert_eq!(entry.expires_at, Some(11_500));

        assert!(!entry.is_expired_at(11_499));
        // Reaching the expiry instant counts as expired
        assert!(entry.is_expired_at(11_500));
        assert_eq!(entry.remaining_ms(11_000), Some(500));
        assert_eq!(entry.remaining_ms(12_000), Some(0));
    }

    #[test]
    fn test_encode() {
        let entry = Entry::new(Bytes::from("hello"));
        assert_eq!(entry.encode(), Bytes::from("0;hello"));
        assert_eq!(entry.encoded_len(), 7);

        let entry = Entry::with_ttl_ms(Bytes::from("x"), 5, 1_000);
        assert_eq!(entry.encode(), Bytes::from("1005;x"));
        assert_eq!(entry.encoded_len(), entry.encode().len());
    }

    #[test]
    fn test_decode_payload_with_separator() {
        let entry = Entry::decode(b"42;a;b;c").unwrap();
        assert_eq!(entry.expires_at, Some(42));
        assert_eq!(entry.payload, Bytes::from("a;b;c"));

        let entry = Entry::decode(b"0;").unwrap();
        assert_eq!(entry.expires_at, None);
        assert!(entry.payload.is_empty());
    }

    #[test]
    fn test_huge_ttl_survives_encode_decode() {
        let entry = Entry::with_ttl_ms(Bytes::from("v"), i64::MAX, now_millis());
        assert_eq!(entry.expires_at, Some(i64::MAX as u64));

        let decoded = Entry::decode(&entry.encode()).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(entry.encoded_len(), entry.encode().len());
    }

    #[test]
    fn test_decode_negative_expiry_is_persistent() {
        let entry = Entry::decode(b"-1;value").unwrap();
        assert_eq!(entry.expires_at, None);
        assert_eq!(entry.payload, Bytes::from("value"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Entry::decode(b"no separator"),
            Err(StoreError::Corrupt(_))
        ));
        assert!(matches!(
            Entry::decode(b"abc;value"),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_decimal_len() {
        assert_eq!(decimal_len(0), 1);
        assert_eq!(decimal_len(9), 1);
        assert_eq!(decimal_len(10), 2);
        assert_eq!(decimal_len(1_700_000_000_000), 13);
        assert_eq!(decimal_len(u64::MAX), 20);
    }
}
