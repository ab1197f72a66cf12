//! Key construction and parsing
//!
//! ## Key Layouts
//! ```text
//! Superblock     "kvsb" (4)
//! Collection     prefix u32 (4) | group u8 (1)                        | escaped name
//! Onode          prefix u32 (4) | shard (1) | pool (8) | hash (4) | snap (8) | gen (8) | ns/key/name
//! Data block     group u8 (1)   | shard (1) | pool (8) | hash (4) | snap (8) | gen (8) | block u16 (2) | ns/key/name
//! Journal        group u8 (1)   | index u64 (8)
//! Omap entry     group u8 (1)   | object id u64 (8) | is_header u8 (1)   | escaped entry name
//! Omap key block group u32 (4)  | object id u64 (8) | block id u32 (4)
//! ```
//!
//! Integers are little-endian. Shard and pool are biased by `0x80` and
//! `0x8000_0000_0000_0000` so that negative values sort below positive ones
//! in the byte encoding.

use crate::error::{KvsError, Result};

use super::buf::{KeyBuf, KeyReader};
use super::escape;
use super::identity::ObjectIdentity;

// =============================================================================
// Discriminators
// =============================================================================

pub const GROUP_ONODE: u8 = 0x0;
pub const GROUP_COLL: u8 = 0x1;
pub const GROUP_DATA: u8 = 0x2;
pub const GROUP_JOURNAL: u8 = 0x3;
pub const GROUP_OMAP: u8 = 0x4;
pub const GROUP_OMAP_BLOCK: u8 = 0x5;

/// Superblock key bytes
pub const SUPERBLOCK_MAGIC: &[u8; 4] = b"kvsb";

const SHARD_BIAS: u8 = 0x80;
const POOL_BIAS: u64 = 0x8000_0000_0000_0000;

/// Fixed header sizes (bytes before any escaped suffix)
pub const COLL_HEADER_SIZE: usize = 5;
pub const ONODE_HEADER_SIZE: usize = 33;
pub const DATA_HEADER_SIZE: usize = 32;
pub const JOURNAL_KEY_SIZE: usize = 9;
pub const OMAP_HEADER_SIZE: usize = 10;
pub const OMAP_BLOCK_KEY_SIZE: usize = 16;

/// The seven key classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    Superblock,
    Collection,
    Onode,
    Data,
    Journal,
    Omap,
    OmapBlock,
}

impl KeyClass {
    /// Classify a raw key by its discriminator
    pub fn of(key: &[u8]) -> Option<KeyClass> {
        if key == SUPERBLOCK_MAGIC {
            return Some(KeyClass::Superblock);
        }
        let first = *key.first()?;
        let wide = key
            .get(..4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));

        match first {
            GROUP_ONODE if wide == Some(GROUP_ONODE as u32) => Some(KeyClass::Onode),
            GROUP_COLL if wide == Some(GROUP_COLL as u32) && key.get(4) == Some(&GROUP_COLL) => {
                Some(KeyClass::Collection)
            }
            GROUP_DATA => Some(KeyClass::Data),
            GROUP_JOURNAL => Some(KeyClass::Journal),
            GROUP_OMAP => Some(KeyClass::Omap),
            GROUP_OMAP_BLOCK if wide == Some(GROUP_OMAP_BLOCK as u32) => Some(KeyClass::OmapBlock),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyClass::Superblock => "superblock",
            KeyClass::Collection => "collection",
            KeyClass::Onode => "onode",
            KeyClass::Data => "data",
            KeyClass::Journal => "journal",
            KeyClass::Omap => "omap",
            KeyClass::OmapBlock => "omap-block",
        }
    }
}

/// Decoded omap-entry key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OmapEntry {
    Header,
    Entry(Vec<u8>),
}

// =============================================================================
// Superblock
// =============================================================================

pub fn superblock_key() -> Result<KeyBuf> {
    KeyBuf::from_slice(SUPERBLOCK_MAGIC)
}

pub fn parse_superblock_key(key: &[u8]) -> Result<()> {
    if key != SUPERBLOCK_MAGIC {
        return Err(mismatch("superblock", key));
    }
    Ok(())
}

// =============================================================================
// Collection
// =============================================================================

pub fn collection_key(name: &[u8]) -> Result<KeyBuf> {
    let mut key = KeyBuf::new();
    key.reserve(COLL_HEADER_SIZE + escape::escaped_len(name))?;
    key.put_u32_le(GROUP_COLL as u32)?;
    key.put_u8(GROUP_COLL)?;
    key.put_slice(&escape::encode(name))?;
    Ok(key)
}

pub fn parse_collection_key(key: &[u8]) -> Result<Vec<u8>> {
    let mut reader = KeyReader::new(key);
    let prefix = reader.u32_le("collection prefix")?;
    let group = reader.u8("collection group")?;
    if prefix != GROUP_COLL as u32 || group != GROUP_COLL {
        return Err(mismatch("collection", key));
    }
    escape::decode(reader.rest())
}

// =============================================================================
// Onode and Data Block
// =============================================================================

/// Suffix shared by onode and data keys
fn identity_suffix(oid: &ObjectIdentity) -> Vec<u8> {
    escape::compose(&oid.namespace, oid.key(), &oid.name)
}

fn put_identity_fields(key: &mut KeyBuf, oid: &ObjectIdentity) -> Result<()> {
    key.put_u8((oid.shard as u8).wrapping_add(SHARD_BIAS))?;
    key.put_u64_le((oid.pool as u64).wrapping_add(POOL_BIAS))?;
    key.put_u32_le(oid.bitwise_key)?;
    key.put_u64_le(oid.snap)?;
    key.put_u64_le(oid.generation)
}

struct IdentityFields {
    shard: i8,
    pool: i64,
    bitwise_key: u32,
    snap: u64,
    generation: u64,
}

fn read_identity_fields(reader: &mut KeyReader<'_>) -> Result<IdentityFields> {
    Ok(IdentityFields {
        shard: reader.u8("shard")?.wrapping_sub(SHARD_BIAS) as i8,
        pool: reader.u64_le("pool")?.wrapping_sub(POOL_BIAS) as i64,
        bitwise_key: reader.u32_le("bitwise key")?,
        snap: reader.u64_le("snap")?,
        generation: reader.u64_le("generation")?,
    })
}

fn finish_identity(fields: IdentityFields, suffix: &[u8]) -> Result<ObjectIdentity> {
    let (parts, consumed) = escape::decompose(suffix)?;
    if consumed != suffix.len() {
        return Err(KvsError::MalformedKey(format!(
            "{} trailing bytes after object name",
            suffix.len() - consumed
        )));
    }
    Ok(ObjectIdentity::from_parts(
        fields.shard,
        fields.pool,
        fields.bitwise_key,
        fields.snap,
        fields.generation,
        parts,
    ))
}

pub fn onode_key(oid: &ObjectIdentity) -> Result<KeyBuf> {
    let suffix = identity_suffix(oid);
    let mut key = KeyBuf::new();
    key.reserve(ONODE_HEADER_SIZE + suffix.len())?;
    key.put_u32_le(GROUP_ONODE as u32)?;
    put_identity_fields(&mut key, oid)?;
    key.put_slice(&suffix)?;
    Ok(key)
}

pub fn parse_onode_key(key: &[u8]) -> Result<ObjectIdentity> {
    let mut reader = KeyReader::new(key);
    let prefix = reader.u32_le("onode prefix")?;
    if prefix != GROUP_ONODE as u32 {
        return Err(KvsError::KeyClassMismatch {
            expected: "onode",
            found: prefix,
        });
    }
    let fields = read_identity_fields(&mut reader)?;
    finish_identity(fields, reader.rest())
}

pub fn data_key(oid: &ObjectIdentity, block: u16) -> Result<KeyBuf> {
    let suffix = identity_suffix(oid);
    let mut key = KeyBuf::new();
    key.reserve(DATA_HEADER_SIZE + suffix.len())?;
    key.put_u8(GROUP_DATA)?;
    put_identity_fields(&mut key, oid)?;
    key.put_u16_le(block)?;
    key.put_slice(&suffix)?;
    Ok(key)
}

pub fn parse_data_key(key: &[u8]) -> Result<(ObjectIdentity, u16)> {
    let mut reader = KeyReader::new(key);
    let group = reader.u8("data group")?;
    if group != GROUP_DATA {
        return Err(KvsError::KeyClassMismatch {
            expected: "data",
            found: group as u32,
        });
    }
    let fields = read_identity_fields(&mut reader)?;
    let block = reader.u16_le("block index")?;
    Ok((finish_identity(fields, reader.rest())?, block))
}

// =============================================================================
// Journal
// =============================================================================

pub fn journal_key(index: u64) -> Result<KeyBuf> {
    let mut key = KeyBuf::new();
    key.put_u8(GROUP_JOURNAL)?;
    key.put_u64_le(index)?;
    Ok(key)
}

pub fn parse_journal_key(key: &[u8]) -> Result<u64> {
    let mut reader = KeyReader::new(key);
    let group = reader.u8("journal group")?;
    if group != GROUP_JOURNAL {
        return Err(KvsError::KeyClassMismatch {
            expected: "journal",
            found: group as u32,
        });
    }
    let index = reader.u64_le("journal index")?;
    reader.finish()?;
    Ok(index)
}

// =============================================================================
// Omap
// =============================================================================

/// Key of the omap header of object `lid`
pub fn omap_header_key(lid: u64) -> Result<KeyBuf> {
    let mut key = KeyBuf::new();
    key.put_u8(GROUP_OMAP)?;
    key.put_u64_le(lid)?;
    key.put_u8(1)?;
    Ok(key)
}

/// Key of omap entry `name` of object `lid`; an empty name is the header
pub fn omap_key(lid: u64, name: &[u8]) -> Result<KeyBuf> {
    if name.is_empty() {
        return omap_header_key(lid);
    }
    let mut key = KeyBuf::new();
    key.reserve(OMAP_HEADER_SIZE + escape::escaped_len(name))?;
    key.put_u8(GROUP_OMAP)?;
    key.put_u64_le(lid)?;
    key.put_u8(0)?;
    key.put_slice(&escape::encode(name))?;
    Ok(key)
}

/// Common prefix of every (non-header) omap entry of object `lid`
pub fn omap_entries_prefix(lid: u64) -> Result<KeyBuf> {
    let mut key = KeyBuf::new();
    key.put_u8(GROUP_OMAP)?;
    key.put_u64_le(lid)?;
    key.put_u8(0)?;
    Ok(key)
}

pub fn parse_omap_key(key: &[u8]) -> Result<(u64, OmapEntry)> {
    let mut reader = KeyReader::new(key);
    let group = reader.u8("omap group")?;
    if group != GROUP_OMAP {
        return Err(KvsError::KeyClassMismatch {
            expected: "omap",
            found: group as u32,
        });
    }
    let lid = reader.u64_le("omap object id")?;
    match reader.u8("omap header flag")? {
        1 => {
            reader.finish()?;
            Ok((lid, OmapEntry::Header))
        }
        0 => Ok((lid, OmapEntry::Entry(escape::decode(reader.rest())?))),
        other => Err(KvsError::MalformedKey(format!(
            "invalid omap header flag {}",
            other
        ))),
    }
}

pub fn omap_block_key(lid: u64, block_id: u32) -> Result<KeyBuf> {
    let mut key = KeyBuf::new();
    key.put_u32_le(GROUP_OMAP_BLOCK as u32)?;
    key.put_u64_le(lid)?;
    key.put_u32_le(block_id)?;
    Ok(key)
}

pub fn parse_omap_block_key(key: &[u8]) -> Result<(u64, u32)> {
    let mut reader = KeyReader::new(key);
    let group = reader.u32_le("omap block group")?;
    if group != GROUP_OMAP_BLOCK as u32 {
        return Err(KvsError::KeyClassMismatch {
            expected: "omap-block",
            found: group,
        });
    }
    let lid = reader.u64_le("omap object id")?;
    let block_id = reader.u32_le("omap block id")?;
    reader.finish()?;
    Ok((lid, block_id))
}

fn mismatch(expected: &'static str, key: &[u8]) -> KvsError {
    KvsError::KeyClassMismatch {
        expected,
        found: key.first().copied().unwrap_or(0) as u32,
    }
}
