//! Composite key codec
//!
//! Keys are built from typed segments appended in order:
//! - strings: 4-byte big-endian length followed by the UTF-8 bytes
//! - integers: 8 big-endian bytes
//!
//! The encoding is injective, and non-negative integer segments at the same
//! position under a common prefix sort numerically. This is what lets the
//! completed-run partition store `i64::MAX - start_ts` and read newest-first
//! with a plain ascending scan.
//!
//! ## Contract
//!
//! The byte layout is persisted. Changing it orphans every existing row.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

/// An encoded composite key
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MdsKey(Vec<u8>);

impl MdsKey {
    /// Wrap raw key bytes (e.g. read back from a scan)
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        MdsKey(bytes)
    }

    /// Key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Start a splitter over this key's segments
    pub fn split(&self) -> KeySplitter<'_> {
        KeySplitter::new(&self.0)
    }

    /// Smallest key strictly greater than every key prefixed by this one
    pub fn stop_key(&self) -> Option<MdsKey> {
        stop_key_for_prefix(&self.0).map(MdsKey)
    }
}

impl fmt::Debug for MdsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MdsKey(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

impl AsRef<[u8]> for MdsKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Appends typed segments to a key
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    buf: Vec<u8>,
}

impl KeyBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue building from an existing key
    pub fn from_key(key: &MdsKey) -> Self {
        Self {
            buf: key.0.clone(),
        }
    }

    /// Append a length-prefixed string segment
    pub fn add_str(mut self, s: &str) -> Self {
        let mut len = [0u8; 4];
        BigEndian::write_u32(&mut len, s.len() as u32);
        self.buf.extend_from_slice(&len);
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Append an 8-byte big-endian signed integer segment
    pub fn add_i64(mut self, v: i64) -> Self {
        let mut bytes = [0u8; 8];
        BigEndian::write_i64(&mut bytes, v);
        self.buf.extend_from_slice(&bytes);
        self
    }

    /// Finish the key
    pub fn build(self) -> MdsKey {
        MdsKey(self.buf)
    }
}

/// Reads typed segments back out of a key, front to back
#[derive(Debug)]
pub struct KeySplitter<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> KeySplitter<'a> {
    /// Splitter positioned at the first segment
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                Error::Corruption(format!(
                    "key truncated: need {} bytes at offset {}, have {}",
                    n,
                    self.pos,
                    self.bytes.len()
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read the next string segment
    pub fn get_string(&mut self) -> Result<String> {
        let len = BigEndian::read_u32(self.take(4)?) as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| Error::Corruption(format!("key segment is not UTF-8: {}", e)))
    }

    /// Skip the next string segment
    pub fn skip_string(&mut self) -> Result<()> {
        let len = BigEndian::read_u32(self.take(4)?) as usize;
        self.take(len)?;
        Ok(())
    }

    /// Read the next 8-byte integer segment
    pub fn get_i64(&mut self) -> Result<i64> {
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    /// True if unread bytes remain
    pub fn has_remaining(&self) -> bool {
        self.pos < self.bytes.len()
    }
}

/// Smallest byte string greater than every string starting with `prefix`
///
/// Returns `None` when no such key exists (empty prefix or all `0xFF`), meaning
/// the range is unbounded above.
pub fn stop_key_for_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut stop = prefix.to_vec();
    while let Some(last) = stop.pop() {
        if last < u8::MAX {
            stop.push(last + 1);
            return Some(stop);
        }
    }
    None
}

/// Inverted timestamp stored in completed-run keys
///
/// Timestamps are non-negative; negatives are clamped to zero.
pub fn invert_ts(ts: i64) -> i64 {
    i64::MAX - ts.max(0)
}

/// Inverted scan bound for an exclusive-end window edge
///
/// A window `[start, end)` over start times becomes the inverted key range
/// `[invert_scan_bound(end), invert_scan_bound(start))`. `None` means the
/// bound falls past the largest inverted value and the range is open.
pub fn invert_scan_bound(ts: i64) -> Option<i64> {
    let inverted = invert_ts(ts);
    if inverted < i64::MAX {
        Some(inverted + 1)
    } else {
        None
    }
}
