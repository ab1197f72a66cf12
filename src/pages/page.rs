//! Page
//!
//! A fixed-size buffer at a page-aligned offset. Pages are shared through
//! [`PageRef`]: the owning set holds one reference and every in-flight
//! operation holds another until it returns.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared handle to a page
pub type PageRef = Arc<Page>;

/// A single page of object data
#[derive(Debug)]
pub struct Page {
    /// Page-aligned byte offset within the object
    offset: u64,
    data: RwLock<Box<[u8]>>,
}

impl Page {
    /// Create a zero-filled page
    pub fn new(offset: u64, size: usize) -> Self {
        Self::from_data(offset, vec![0u8; size].into_boxed_slice())
    }

    /// Wrap an already populated buffer
    pub fn from_data(offset: u64, data: Box<[u8]>) -> Self {
        Self {
            offset,
            data: RwLock::new(data),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Page size in bytes
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One past the last byte covered by this page
    pub fn end(&self) -> u64 {
        self.offset + self.len() as u64
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.data.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.data.write()
    }

    /// Copy of the page contents
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.read().to_vec()
    }
}
