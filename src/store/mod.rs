//! Store Module
//!
//! Object-store facade over a key-value medium.
//!
//! ## Key Usage
//! ```text
//! superblock key  -> Superblock { version, page_size, next_omap_id }
//! onode key       -> OnodeRecord { data_len, omap_id }
//! data-block key  -> page bytes + CRC32   (block = page_offset / page_size)
//! omap key        -> omap entry value / omap header
//! ```
//!
//! Data writes stay in memory until `flush`; truncate and remove delete
//! the persisted pages they discard immediately. Omap updates go straight
//! to the medium.

mod medium;
mod object_store;
mod record;

pub use medium::{Medium, MemoryMedium};
pub use object_store::ObjectStore;
pub use record::{
    decode_record, encode_record, frame_page, unframe_page, OnodeRecord, Superblock,
    PAGE_TRAILER_SIZE, SUPERBLOCK_VERSION,
};
