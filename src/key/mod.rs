//! Key Module
//!
//! Maps object-store records onto the fixed-shape binary keys of a
//! key-value device.
//!
//! ## Responsibilities
//! - Order-preserving, prefix-free escaping of variable-length names
//! - Namespace / locator key / name composition
//! - Construction and parsing of the seven key classes
//! - Hard 255-byte cap on every key
//!
//! Keys start with a class discriminator, so a range scan groups records
//! by class first and then by identity.

mod buf;
mod codec;
pub mod escape;
mod identity;

pub use buf::{KeyBuf, KeyReader};
pub use codec::{
    collection_key, data_key, journal_key, omap_block_key, omap_entries_prefix, omap_header_key,
    omap_key, onode_key, parse_collection_key, parse_data_key, parse_journal_key,
    parse_omap_block_key, parse_omap_key, parse_onode_key, parse_superblock_key, superblock_key,
    KeyClass, OmapEntry, COLL_HEADER_SIZE, DATA_HEADER_SIZE, GROUP_COLL, GROUP_DATA,
    GROUP_JOURNAL, GROUP_OMAP, GROUP_OMAP_BLOCK, GROUP_ONODE, JOURNAL_KEY_SIZE,
    OMAP_BLOCK_KEY_SIZE, OMAP_HEADER_SIZE, ONODE_HEADER_SIZE, SUPERBLOCK_MAGIC,
};
pub use escape::NameParts;
pub use identity::{ObjectIdentity, NO_GEN, NO_SHARD, NO_SNAP};

/// Hard cap on the size of any encoded key
pub const MAX_KEY_SIZE: usize = 255;
