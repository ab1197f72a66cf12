//! Object identity
//!
//! The numeric and named fields that identify one object (or one version
//! of it) in the store. Onode and data-block keys are derived from it.

use std::fmt;

use super::escape::NameParts;

/// Shard id of an object that is not part of an erasure-coded group
pub const NO_SHARD: i8 = -1;

/// Generation of the current (non-rollback) object
pub const NO_GEN: u64 = u64::MAX;

/// Snapshot id of the head object
pub const NO_SNAP: u64 = u64::MAX - 1;

/// Identity of an object: placement fields, ordering hash and names
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectIdentity {
    pub shard: i8,
    pub pool: i64,
    /// Bit-reversed placement hash, so enumeration walks hash order
    pub bitwise_key: u32,
    pub snap: u64,
    pub generation: u64,
    pub namespace: Vec<u8>,
    key: Option<Vec<u8>>,
    pub name: Vec<u8>,
}

impl ObjectIdentity {
    /// Head object in `pool` with the given name and no shard
    pub fn new(pool: i64, name: impl Into<Vec<u8>>) -> Self {
        Self {
            shard: NO_SHARD,
            pool,
            bitwise_key: 0,
            snap: NO_SNAP,
            generation: NO_GEN,
            namespace: Vec::new(),
            key: None,
            name: name.into(),
        }
    }

    pub fn with_shard(mut self, shard: i8) -> Self {
        self.shard = shard;
        self
    }

    /// Store `hash` as its bit-reversed bitwise key
    pub fn with_hash(mut self, hash: u32) -> Self {
        self.bitwise_key = hash.reverse_bits();
        self
    }

    pub fn with_bitwise_key(mut self, bitwise_key: u32) -> Self {
        self.bitwise_key = bitwise_key;
        self
    }

    pub fn with_snap(mut self, snap: u64) -> Self {
        self.snap = snap;
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<Vec<u8>>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.set_key(key.into());
        self
    }

    /// Set the locator key; an empty key or one equal to the name is dropped
    pub fn set_key(&mut self, key: Vec<u8>) {
        self.key = if key.is_empty() || key == self.name {
            None
        } else {
            Some(key)
        };
    }

    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    /// The placement hash (inverse of the bitwise key)
    pub fn hash(&self) -> u32 {
        self.bitwise_key.reverse_bits()
    }

    /// Rebuild an identity from decoded header fields and name parts
    pub(crate) fn from_parts(
        shard: i8,
        pool: i64,
        bitwise_key: u32,
        snap: u64,
        generation: u64,
        parts: NameParts,
    ) -> Self {
        let mut oid = Self {
            shard,
            pool,
            bitwise_key,
            snap,
            generation,
            namespace: parts.namespace,
            key: None,
            name: parts.name,
        };
        if let Some(key) = parts.key {
            oid.set_key(key);
        }
        oid
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}:{:08x}:{}:{}",
            self.shard,
            self.pool,
            self.hash(),
            String::from_utf8_lossy(&self.namespace),
            String::from_utf8_lossy(&self.name)
        )?;
        if let Some(key) = &self.key {
            write!(f, "@{}", String::from_utf8_lossy(key))?;
        }
        write!(f, ":{:x}:{:x}", self.snap, self.generation)
    }
}
