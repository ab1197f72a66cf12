//! Data object
//!
//! Byte-addressed object contents layered on a [`PageSet`].

use std::ops::Range;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::error::{KvsError, Result};
use crate::pages::{Page, PageSet};

/// Logical object contents: a length plus sparse pages
///
/// Bytes below `len()` without a page are holes and read as zero. Bytes
/// at or beyond `len()` are undefined.
#[derive(Debug)]
pub struct DataObject {
    data_len: u64,
    pages: PageSet,
}

impl DataObject {
    /// Create an empty object
    pub fn new(page_size: usize) -> Result<Self> {
        Self::with_len(page_size, 0)
    }

    /// Reopen an object whose persisted length is `data_len`
    pub fn with_len(page_size: usize, data_len: u64) -> Result<Self> {
        Ok(Self {
            data_len,
            pages: PageSet::new(page_size)?,
        })
    }

    /// Logical object length
    pub fn len(&self) -> u64 {
        self.data_len
    }

    pub fn is_empty(&self) -> bool {
        self.data_len == 0
    }

    pub fn page_size(&self) -> u64 {
        self.pages.page_size()
    }

    /// Resident pages (for persisting and inspection)
    pub fn pages(&self) -> &PageSet {
        &self.pages
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Read `len` bytes at `offset`; holes and unloaded tails read as zero
    pub fn read<F>(&mut self, offset: u64, len: u64, loader: F) -> Result<Bytes>
    where
        F: FnMut(&mut [u8], u64) -> Result<Option<usize>>,
    {
        debug!(offset, len, "read");
        let end = checked_end(offset, len)?;
        let size = usize::try_from(len).map_err(|_| KvsError::InvalidRange { offset, len })?;

        let pages = self.pages.get_range(offset, len, loader)?;

        let mut buf = BytesMut::zeroed(size);
        for page in &pages {
            if let Some((in_page, in_buf)) = overlap(page, offset, end) {
                buf[in_buf].copy_from_slice(&page.read()[in_page]);
            }
        }
        Ok(buf.freeze())
    }

    /// Write `data` at `offset`, extending the object if needed
    ///
    /// A gap between the old length and `offset` is left as a hole.
    pub fn write<F>(&mut self, offset: u64, data: &[u8], loader: F) -> Result<()>
    where
        F: FnMut(&mut [u8], u64) -> Result<Option<usize>>,
    {
        debug!(offset, len = data.len(), "write");
        let end = checked_end(offset, data.len() as u64)?;

        let pages = self.pages.alloc_range(offset, data.len() as u64, loader)?;
        for page in &pages {
            if let Some((in_page, in_buf)) = overlap(page, offset, end) {
                page.write()[in_page].copy_from_slice(&data[in_buf]);
            }
        }

        self.extend_to(end);
        Ok(())
    }

    /// Record explicit zeroes over `[offset, offset + len)`
    pub fn zero<F>(&mut self, offset: u64, len: u64, loader: F) -> Result<()>
    where
        F: FnMut(&mut [u8], u64) -> Result<Option<usize>>,
    {
        debug!(offset, len, "zero");
        let end = checked_end(offset, len)?;

        let pages = self.pages.alloc_range(offset, len, loader)?;
        for page in &pages {
            if let Some((in_page, _)) = overlap(page, offset, end) {
                page.write()[in_page].fill(0);
            }
        }

        self.extend_to(end);
        Ok(())
    }

    /// Set the object length to `size`, dropping pages past it
    ///
    /// The tail of the page containing `size` is zeroed so stale bytes do
    /// not reappear if the object grows again.
    pub fn truncate<F>(&mut self, size: u64, loader: F) -> Result<()>
    where
        F: FnMut(&mut [u8], u64) -> Result<Option<usize>>,
    {
        debug!(size, old = self.data_len, "truncate");
        self.pages.free_pages_after(size);
        self.data_len = size;

        let page_offset = self.pages.align_down(size);
        if page_offset == size {
            return Ok(());
        }

        let pages = self.pages.get_range(page_offset, self.page_size(), loader)?;
        if let Some(page) = pages.first() {
            let tail = (size - page_offset) as usize;
            page.write()[tail..].fill(0);
        }
        Ok(())
    }

    /// Copy `[src_offset, src_offset + len)` of `src` to `dst_offset` here
    ///
    /// Works one destination page at a time: bytes backed by a source page
    /// are copied, bytes over a source hole become explicit zeroes. On
    /// failure, destination pages already written stay as they are.
    pub fn clone_range<S, D>(
        &mut self,
        src: &mut DataObject,
        src_offset: u64,
        len: u64,
        dst_offset: u64,
        mut src_loader: S,
        mut dst_loader: D,
    ) -> Result<()>
    where
        S: FnMut(&mut [u8], u64) -> Result<Option<usize>>,
        D: FnMut(&mut [u8], u64) -> Result<Option<usize>>,
    {
        debug!(src_offset, len, dst_offset, "clone");
        checked_end(src_offset, len)?;
        let dst_end = checked_end(dst_offset, len)?;

        let mut dst_pos = dst_offset;
        while dst_pos < dst_end {
            let window_end = dst_end.min(self.pages.align_down(dst_pos) + self.page_size());
            let count = window_end - dst_pos;
            let src_pos = src_offset + (dst_pos - dst_offset);

            let src_pages = src.pages.get_range(src_pos, count, &mut src_loader)?;
            let dst_pages = self.pages.alloc_range(dst_pos, count, &mut dst_loader)?;

            for dst_page in &dst_pages {
                let mut dst_data = dst_page.write();
                let window = (dst_pos - dst_page.offset()) as usize
                    ..(window_end - dst_page.offset()) as usize;
                dst_data[window].fill(0);

                for src_page in &src_pages {
                    if let Some((in_src, in_window)) = overlap(src_page, src_pos, src_pos + count) {
                        let at = (dst_pos - dst_page.offset()) as usize + in_window.start;
                        dst_data[at..at + in_window.len()]
                            .copy_from_slice(&src_page.read()[in_src]);
                    }
                }
            }

            dst_pos = window_end;
        }

        self.extend_to(dst_end);
        Ok(())
    }

    /// Call `remover` once for every page slot in `[0, size)`, then drop
    /// all resident pages
    ///
    /// Slots are walked by offset; no pages are allocated for the walk.
    pub fn remove_object<R>(&mut self, size: u64, mut remover: R) -> Result<()>
    where
        R: FnMut(u64) -> Result<()>,
    {
        debug!(size, "remove object");
        let page_size = self.page_size();
        let mut slot = 0;
        while slot < size {
            remover(slot)?;
            slot = match slot.checked_add(page_size) {
                Some(next) => next,
                None => break,
            };
        }

        self.pages.free_pages_after(0);
        self.data_len = 0;
        Ok(())
    }

    fn extend_to(&mut self, end: u64) {
        if self.data_len < end {
            self.data_len = end;
        }
    }
}

fn checked_end(offset: u64, len: u64) -> Result<u64> {
    offset
        .checked_add(len)
        .ok_or(KvsError::InvalidRange { offset, len })
}

/// Intersection of `page` with `[start, end)`
///
/// Returns the range within the page and the same bytes relative to `start`.
fn overlap(page: &Page, start: u64, end: u64) -> Option<(Range<usize>, Range<usize>)> {
    let begin = start.max(page.offset());
    let stop = end.min(page.end());
    if begin >= stop {
        return None;
    }
    let in_page = (begin - page.offset()) as usize..(stop - page.offset()) as usize;
    let relative = (begin - start) as usize..(stop - start) as usize;
    Some((in_page, relative))
}
