//! Persisted value records
//!
//! ## Page Value Format
//! ```text
//! ┌──────────────────────────────┬───────────┐
//! │ Page bytes (page_size)       │ CRC32 (4) │
//! └──────────────────────────────┴───────────┘
//! ```
//! Superblock and onode values are bincode-encoded structs.

use serde::{Deserialize, Serialize};

use crate::error::{KvsError, Result};

/// Current superblock format version
pub const SUPERBLOCK_VERSION: u32 = 1;

/// Size of the CRC32 trailer on page values
pub const PAGE_TRAILER_SIZE: usize = 4;

/// Store-wide settings, stored under the superblock key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    pub version: u32,
    pub page_size: u64,
    /// Next unallocated omap object id
    pub next_omap_id: u64,
}

impl Superblock {
    pub fn new(page_size: u64) -> Self {
        Self {
            version: SUPERBLOCK_VERSION,
            page_size,
            next_omap_id: 1,
        }
    }
}

/// Per-object metadata, stored under the onode key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnodeRecord {
    pub data_len: u64,
    /// Object id of the omap side-map, once one has been created
    pub omap_id: Option<u64>,
}

pub fn encode_record<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(record)?)
}

pub fn decode_record<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| KvsError::Corruption(format!("undecodable record: {}", e)))
}

/// Append a CRC32 trailer to page contents
pub fn frame_page(data: &[u8]) -> Vec<u8> {
    let mut value = Vec::with_capacity(data.len() + PAGE_TRAILER_SIZE);
    value.extend_from_slice(data);
    value.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    value
}

/// Strip (and optionally verify) the CRC32 trailer of a page value
pub fn unframe_page(value: &[u8], verify: bool) -> Result<&[u8]> {
    if value.len() < PAGE_TRAILER_SIZE {
        return Err(KvsError::Corruption(format!(
            "page value of {} bytes has no checksum trailer",
            value.len()
        )));
    }
    let (data, trailer) = value.split_at(value.len() - PAGE_TRAILER_SIZE);
    if verify {
        let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let actual = crc32fast::hash(data);
        if stored != actual {
            return Err(KvsError::Corruption(format!(
                "page checksum mismatch: stored {:08x}, computed {:08x}",
                stored, actual
            )));
        }
    }
    Ok(data)
}
