//! Pages Module
//!
//! Sparse page storage for object data.
//!
//! ## Responsibilities
//! - Fixed-size, page-aligned buffers with shared ownership
//! - Lazy materialization through a caller-supplied loader
//! - Hole tracking: slots never written stay absent
//! - Releasing pages past a truncation point
//!
//! ## Loader Contract
//! ```text
//! loader(buffer, page_offset) -> Ok(Some(n))  page existed, n bytes filled
//!                             -> Ok(None)     never written (a hole)
//!                             -> Err(e)       unrecoverable, abort the call
//! ```
//! Loaders run synchronously on the calling thread.

mod page;
mod set;

pub use page::{Page, PageRef};
pub use set::{PageSet, PageVec};

use crate::error::Result;

/// Loader that reports every slot as never written
pub fn no_load(_buffer: &mut [u8], _offset: u64) -> Result<Option<usize>> {
    Ok(None)
}
