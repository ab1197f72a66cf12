//! Key-value medium
//!
//! The device a store persists to: length-bounded binary keys, opaque
//! values, point operations and ordered prefix scans.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use crate::error::{KvsError, Result};
use crate::key::MAX_KEY_SIZE;

/// Storage device interface used by [`super::ObjectStore`]
pub trait Medium: Send + Sync {
    /// Fetch the value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete `key`; returns whether it existed
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// In-memory medium backed by an ordered map
///
/// ## Concurrency:
/// - `entries`: Protected by RwLock (many concurrent readers, exclusive writer)
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of every stored key, in order
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.entries.read().keys().cloned().collect()
    }
}

impl Medium for MemoryMedium {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.len() > MAX_KEY_SIZE {
            return Err(KvsError::KeyTooLong { len: key.len() });
        }
        if key.is_empty() {
            return Err(KvsError::Medium("empty key".to_string()));
        }
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = self.entries.read();
        let range = entries.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded));
        Ok(range
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
