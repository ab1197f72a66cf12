//! Bounded key buffer and field reader
//!
//! Keys are assembled field by field into a fixed 255-byte buffer. Every
//! writer checks the remaining capacity first, so an oversized key fails
//! before anything is written. Multi-byte integers are little-endian with
//! no padding between fields.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use crate::error::{KvsError, Result};

use super::MAX_KEY_SIZE;

/// A persisted key, at most [`MAX_KEY_SIZE`] bytes long
#[derive(Clone)]
pub struct KeyBuf {
    buf: [u8; MAX_KEY_SIZE],
    len: usize,
}

impl KeyBuf {
    /// Create an empty key
    pub fn new() -> Self {
        Self {
            buf: [0u8; MAX_KEY_SIZE],
            len: 0,
        }
    }

    /// Copy an existing byte string into a key
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut key = Self::new();
        key.put_slice(bytes)?;
        Ok(key)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes still available before the cap
    pub fn remaining(&self) -> usize {
        MAX_KEY_SIZE - self.len
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    // =========================================================================
    // Writers
    // =========================================================================

    /// Ensure `additional` more bytes fit, without writing anything
    pub fn reserve(&self, additional: usize) -> Result<()> {
        if additional > self.remaining() {
            return Err(KvsError::KeyTooLong {
                len: self.len + additional,
            });
        }
        Ok(())
    }

    pub fn put_slice(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put_slice(&[value])
    }

    pub fn put_u16_le(&mut self, value: u16) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    pub fn put_u32_le(&mut self, value: u32) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }

    pub fn put_u64_le(&mut self, value: u64) -> Result<()> {
        self.put_slice(&value.to_le_bytes())
    }
}

impl Default for KeyBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for KeyBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for KeyBuf {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for KeyBuf {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for KeyBuf {}

impl PartialOrd for KeyBuf {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyBuf {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Hash for KeyBuf {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Debug for KeyBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyBuf({})", hex::encode(self.as_bytes()))
    }
}

impl fmt::Display for KeyBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.as_bytes()))
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Sequential reader over the fixed header of a key
pub struct KeyReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> KeyReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn take<const N: usize>(&mut self, field: &str) -> Result<[u8; N]> {
        let end = self.pos + N;
        if end > self.bytes.len() {
            return Err(KvsError::MalformedKey(format!(
                "truncated {} at byte {} (key length {})",
                field,
                self.pos,
                self.bytes.len()
            )));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    pub fn u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.take::<1>(field)?[0])
    }

    pub fn u16_le(&mut self, field: &str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(field)?))
    }

    pub fn u32_le(&mut self, field: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(field)?))
    }

    pub fn u64_le(&mut self, field: &str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(field)?))
    }

    /// Fail unless every byte has been consumed
    pub fn finish(&self) -> Result<()> {
        if !self.is_empty() {
            return Err(KvsError::MalformedKey(format!(
                "{} trailing bytes after key fields",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}
