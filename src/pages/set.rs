//! Page set
//!
//! Sparse, ordered map from page-aligned offset to page. Missing pages are
//! materialized on demand through a caller-supplied loader; a read never
//! creates a page for a slot the loader reports as a hole.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::error::{KvsError, Result};

use super::page::{Page, PageRef};

/// Pages returned by one range call, ordered by offset
pub type PageVec = Vec<PageRef>;

/// Sparse collection of fixed-size pages
#[derive(Debug)]
pub struct PageSet {
    page_size: u64,
    pages: BTreeMap<u64, PageRef>,
}

impl PageSet {
    /// Create an empty set; `page_size` must be a power of two
    pub fn new(page_size: usize) -> Result<Self> {
        if !page_size.is_power_of_two() {
            return Err(KvsError::Config(format!(
                "page size {} is not a power of two",
                page_size
            )));
        }
        Ok(Self {
            page_size: page_size as u64,
            pages: BTreeMap::new(),
        })
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of resident pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.pages.contains_key(&self.align_down(offset))
    }

    /// Resident page covering `offset`, if any
    pub fn page(&self, offset: u64) -> Option<PageRef> {
        self.pages.get(&self.align_down(offset)).cloned()
    }

    /// Resident page offsets in ascending order
    pub fn offsets(&self) -> impl Iterator<Item = u64> + '_ {
        self.pages.keys().copied()
    }

    /// Resident pages in ascending order
    pub fn pages(&self) -> impl Iterator<Item = &PageRef> + '_ {
        self.pages.values()
    }

    pub fn align_down(&self, offset: u64) -> u64 {
        offset & !(self.page_size - 1)
    }

    /// Smallest page boundary at or after `offset`
    pub fn align_up(&self, offset: u64) -> u64 {
        self.align_down(offset.saturating_add(self.page_size - 1))
    }

    // =========================================================================
    // Range Operations
    // =========================================================================

    /// Collect the existing pages overlapping `[offset, offset + len)`
    ///
    /// Missing slots are offered to `loader`; a slot it reports as never
    /// written stays absent, so gaps in the result are holes.
    pub fn get_range<F>(&mut self, offset: u64, len: u64, mut loader: F) -> Result<PageVec>
    where
        F: FnMut(&mut [u8], u64) -> Result<Option<usize>>,
    {
        let mut pages = PageVec::new();
        for slot in self.slots(offset, len)? {
            if let Some(page) = self.pages.get(&slot) {
                pages.push(Arc::clone(page));
                continue;
            }

            match self.load(slot, &mut loader)? {
                Some(data) => {
                    trace!(offset = slot, "page loaded");
                    let page = Arc::new(Page::from_data(slot, data));
                    self.pages.insert(slot, Arc::clone(&page));
                    pages.push(page);
                }
                None => trace!(offset = slot, "hole"),
            }
        }
        Ok(pages)
    }

    /// Ensure every slot overlapping `[offset, offset + len)` has a page
    ///
    /// Missing pages are zero-filled, then offered to `loader` so that any
    /// persisted contents are brought in before the caller modifies them.
    pub fn alloc_range<F>(&mut self, offset: u64, len: u64, mut loader: F) -> Result<PageVec>
    where
        F: FnMut(&mut [u8], u64) -> Result<Option<usize>>,
    {
        let mut pages = PageVec::new();
        for slot in self.slots(offset, len)? {
            if let Some(page) = self.pages.get(&slot) {
                pages.push(Arc::clone(page));
                continue;
            }

            let data = match self.load(slot, &mut loader)? {
                Some(data) => data,
                None => vec![0u8; self.page_size as usize].into_boxed_slice(),
            };
            trace!(offset = slot, "page allocated");
            let page = Arc::new(Page::from_data(slot, data));
            self.pages.insert(slot, Arc::clone(&page));
            pages.push(page);
        }
        Ok(pages)
    }

    /// Drop every page starting at or after the first boundary >= `offset`
    ///
    /// Returns the number of pages released. Operations still holding a
    /// reference keep their page alive until they finish.
    pub fn free_pages_after(&mut self, offset: u64) -> usize {
        let boundary = self.align_up(offset);
        let freed = self.pages.split_off(&boundary);
        if !freed.is_empty() {
            trace!(boundary, count = freed.len(), "pages freed");
        }
        freed.len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Aligned slot offsets covering `[offset, offset + len)`
    fn slots(&self, offset: u64, len: u64) -> Result<impl Iterator<Item = u64>> {
        let end = offset
            .checked_add(len)
            .ok_or(KvsError::InvalidRange { offset, len })?;
        let start = self.align_down(offset);
        let step = self.page_size;
        let count = if len == 0 {
            0
        } else {
            (end - start).div_ceil(step)
        };
        Ok((0..count).map(move |i| start + i * step))
    }

    /// Run the loader for one slot; `None` means the slot was never written
    fn load<F>(&self, slot: u64, loader: &mut F) -> Result<Option<Box<[u8]>>>
    where
        F: FnMut(&mut [u8], u64) -> Result<Option<usize>>,
    {
        let mut data = vec![0u8; self.page_size as usize].into_boxed_slice();
        match loader(&mut data, slot) {
            Ok(Some(populated)) if populated > data.len() => Err(KvsError::Load {
                offset: slot,
                reason: format!(
                    "loader populated {} bytes into a {} byte page",
                    populated,
                    data.len()
                ),
            }),
            Ok(Some(_)) => Ok(Some(data)),
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(offset = slot, error = %e, "page load failed");
                Err(e)
            }
        }
    }
}
