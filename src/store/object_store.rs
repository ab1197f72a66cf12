//! Object store
//!
//! Coordinates identities, keys, data objects and the medium.
//!
//! ## Responsibilities
//! - Open (or format) a store on a medium via the superblock
//! - Cache open objects and serialize access to each of them
//! - Route page loads/removals to data-block keys
//! - Persist dirty pages and onode records on flush
//! - Keep each object's omap side-map under omap-entry keys

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::data::DataObject;
use crate::error::{KvsError, Result};
use crate::key::{
    data_key, omap_entries_prefix, omap_header_key, omap_key, onode_key, parse_omap_key,
    superblock_key, ObjectIdentity, OmapEntry,
};

use super::medium::Medium;
use super::record::{decode_record, encode_record, frame_page, unframe_page, OnodeRecord, Superblock};

type ObjectHandle = Arc<Mutex<OpenObject>>;

/// An object held in the store's cache
struct OpenObject {
    data: DataObject,
    omap_id: Option<u64>,
    /// Resident pages modified since the last flush
    dirty_pages: BTreeSet<u64>,
    /// Onode record differs from what the medium holds
    onode_dirty: bool,
}

impl OpenObject {
    fn record(&self) -> OnodeRecord {
        OnodeRecord {
            data_len: self.data.len(),
            omap_id: self.omap_id,
        }
    }

    /// Remember every resident page overlapping `[offset, offset + len)`
    fn mark_dirty(&mut self, offset: u64, len: u64) {
        let page_size = self.data.page_size();
        let end = offset.saturating_add(len);
        let mut slot = self.data.pages().align_down(offset);
        while slot < end {
            if self.data.pages().contains(slot) {
                self.dirty_pages.insert(slot);
            }
            slot += page_size;
        }
        self.onode_dirty = true;
    }
}

/// Object store over a key-value [`Medium`]
///
/// ## Concurrency:
/// - `objects`: Mutex around the open-object cache, held only for lookups
///   and inserts, never across medium I/O
/// - each open object has its own Mutex, held for one whole operation
/// - `clone_range` locks source and destination in identity order
/// - `superblock`: Mutex serializing omap id allocation
///
/// ## Cache lifetime:
/// An object stays cached, with every page it has touched resident, until
/// [`ObjectStore::evict`] or [`ObjectStore::remove`]. Nothing is evicted
/// automatically; callers bound memory by evicting objects they are done
/// with. `flush` persists without releasing pages.
pub struct ObjectStore<M: Medium> {
    config: Config,
    medium: Arc<M>,
    objects: Mutex<HashMap<ObjectIdentity, ObjectHandle>>,
    superblock: Mutex<Superblock>,
}

impl<M: Medium> ObjectStore<M> {
    /// Open a store on `medium`, formatting it if it has no superblock
    pub fn open(config: Config, medium: Arc<M>) -> Result<Self> {
        config.validate()?;

        let key = superblock_key()?;
        let superblock = match medium.get(&key)? {
            Some(value) => {
                let superblock: Superblock = decode_record(&value)?;
                if superblock.page_size != config.page_size as u64 {
                    return Err(KvsError::Config(format!(
                        "store was formatted with page size {}, configured {}",
                        superblock.page_size, config.page_size
                    )));
                }
                info!(page_size = superblock.page_size, "opened store");
                superblock
            }
            None => {
                let superblock = Superblock::new(config.page_size as u64);
                medium.put(&key, &encode_record(&superblock)?)?;
                info!(page_size = superblock.page_size, "formatted store");
                superblock
            }
        };

        Ok(Self {
            config,
            medium,
            objects: Mutex::new(HashMap::new()),
            superblock: Mutex::new(superblock),
        })
    }

    // =========================================================================
    // Object Lifecycle
    // =========================================================================

    /// Create `oid` if it does not exist and persist its onode
    pub fn create(&self, oid: &ObjectIdentity) -> Result<()> {
        debug!(%oid, "create");
        let handle = self.handle(oid, true)?;
        let mut obj = handle.lock();
        if obj.onode_dirty {
            self.persist_onode(oid, &mut obj)?;
        }
        Ok(())
    }

    pub fn exists(&self, oid: &ObjectIdentity) -> Result<bool> {
        if self.objects.lock().contains_key(oid) {
            return Ok(true);
        }
        Ok(self.medium.get(&onode_key(oid)?)?.is_some())
    }

    /// Logical length of `oid`
    pub fn len(&self, oid: &ObjectIdentity) -> Result<u64> {
        let handle = self.handle(oid, false)?;
        let len = handle.lock().data.len();
        Ok(len)
    }

    /// Delete `oid`: every page, its omap and its onode
    pub fn remove(&self, oid: &ObjectIdentity) -> Result<()> {
        debug!(%oid, "remove");
        let handle = self.handle(oid, false)?;
        let mut obj = handle.lock();

        let size = obj.data.len();
        obj.data.remove_object(size, |offset| {
            let key = data_key(oid, self.block_index(offset)?)?;
            self.medium.delete(&key).map_err(|e| KvsError::Remove {
                offset,
                reason: e.to_string(),
            })?;
            trace!(offset, "page removed");
            Ok(())
        })?;

        if let Some(lid) = obj.omap_id.take() {
            self.clear_omap(lid)?;
        }
        self.medium.delete(&onode_key(oid)?)?;
        obj.dirty_pages.clear();
        obj.onode_dirty = false;
        drop(obj);

        self.objects.lock().remove(oid);
        Ok(())
    }

    // =========================================================================
    // Data Operations
    // =========================================================================

    /// Read up to `len` bytes at `offset`, clamped to the object length
    pub fn read(&self, oid: &ObjectIdentity, offset: u64, len: u64) -> Result<Bytes> {
        debug!(%oid, offset, len, "read");
        let handle = self.handle(oid, false)?;
        let mut obj = handle.lock();

        let size = obj.data.len();
        if offset >= size {
            return Ok(Bytes::new());
        }
        let len = len.min(size - offset);
        obj.data.read(offset, len, self.page_loader(oid))
    }

    /// Write `data` at `offset`, creating the object if needed
    pub fn write(&self, oid: &ObjectIdentity, offset: u64, data: &[u8]) -> Result<()> {
        debug!(%oid, offset, len = data.len(), "write");
        self.check_bounds(offset, data.len() as u64)?;
        let handle = self.handle(oid, true)?;
        let mut obj = handle.lock();

        let result = obj.data.write(offset, data, self.page_loader(oid));
        obj.mark_dirty(offset, data.len() as u64);
        result
    }

    /// Write explicit zeroes over `[offset, offset + len)`
    pub fn zero(&self, oid: &ObjectIdentity, offset: u64, len: u64) -> Result<()> {
        debug!(%oid, offset, len, "zero");
        self.check_bounds(offset, len)?;
        let handle = self.handle(oid, true)?;
        let mut obj = handle.lock();

        let result = obj.data.zero(offset, len, self.page_loader(oid));
        obj.mark_dirty(offset, len);
        result
    }

    /// Set the length of `oid`, deleting persisted pages past the new end
    pub fn truncate(&self, oid: &ObjectIdentity, size: u64) -> Result<()> {
        debug!(%oid, size, "truncate");
        self.check_bounds(size, 0)?;
        let handle = self.handle(oid, false)?;
        let mut obj = handle.lock();

        let page_size = self.config.page_size as u64;
        let keep = obj.data.pages().align_up(size);
        let old_end = obj.data.pages().align_up(obj.data.len());
        let mut slot = keep;
        while slot < old_end {
            self.medium.delete(&data_key(oid, self.block_index(slot)?)?)?;
            slot += page_size;
        }
        obj.dirty_pages.retain(|&dirty| dirty < keep);

        // the length changes even if the tail page fails to load
        let result = obj.data.truncate(size, self.page_loader(oid));
        obj.mark_dirty(size, 1);
        result
    }

    /// Copy `[src_offset, src_offset + len)` of `src` to `dst_offset` of `dst`
    ///
    /// Source holes become explicit zeroes in the destination. `dst` is
    /// created if it does not exist.
    pub fn clone_range(
        &self,
        src: &ObjectIdentity,
        dst: &ObjectIdentity,
        src_offset: u64,
        len: u64,
        dst_offset: u64,
    ) -> Result<()> {
        debug!(%src, %dst, src_offset, len, dst_offset, "clone range");
        self.check_bounds(src_offset, len)?;
        self.check_bounds(dst_offset, len)?;

        if src == dst {
            let handle = self.handle(src, false)?;
            let mut obj = handle.lock();
            let bytes = obj.data.read(src_offset, len, self.page_loader(src))?;
            let result = obj.data.write(dst_offset, &bytes, self.page_loader(dst));
            obj.mark_dirty(dst_offset, len);
            return result;
        }

        let src_handle = self.handle(src, false)?;
        let dst_handle = self.handle(dst, true)?;
        let (mut src_obj, mut dst_obj) = if src < dst {
            let s = src_handle.lock();
            (s, dst_handle.lock())
        } else {
            let d = dst_handle.lock();
            (src_handle.lock(), d)
        };

        let result = dst_obj.data.clone_range(
            &mut src_obj.data,
            src_offset,
            len,
            dst_offset,
            self.page_loader(src),
            self.page_loader(dst),
        );
        dst_obj.mark_dirty(dst_offset, len);
        result
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Persist the dirty pages and onode of `oid`
    pub fn flush(&self, oid: &ObjectIdentity) -> Result<()> {
        let handle = match self.objects.lock().get(oid) {
            Some(handle) => Arc::clone(handle),
            None => return Ok(()),
        };
        let mut obj = handle.lock();
        self.flush_object(oid, &mut obj)
    }

    /// Persist every open object
    pub fn flush_all(&self) -> Result<()> {
        let handles: Vec<(ObjectIdentity, ObjectHandle)> = self
            .objects
            .lock()
            .iter()
            .map(|(oid, handle)| (oid.clone(), Arc::clone(handle)))
            .collect();

        for (oid, handle) in handles {
            let mut obj = handle.lock();
            self.flush_object(&oid, &mut obj)?;
        }
        Ok(())
    }

    /// Flush `oid` and drop it from the cache; later access reloads it
    pub fn evict(&self, oid: &ObjectIdentity) -> Result<()> {
        self.flush(oid)?;
        self.objects.lock().remove(oid);
        Ok(())
    }

    /// Flush everything and close the store
    pub fn close(self) -> Result<()> {
        self.flush_all()
    }

    // =========================================================================
    // Omap
    // =========================================================================

    /// Set omap entry `name` of `oid`, creating the object if needed
    pub fn omap_set(&self, oid: &ObjectIdentity, name: &[u8], value: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(KvsError::MalformedKey("empty omap entry name".to_string()));
        }
        let lid = self.omap_id(oid, true)?.ok_or_else(|| not_found(oid))?;
        self.medium.put(&omap_key(lid, name)?, value)
    }

    pub fn omap_get(&self, oid: &ObjectIdentity, name: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.omap_id(oid, false)? {
            Some(lid) if !name.is_empty() => self.medium.get(&omap_key(lid, name)?),
            _ => Ok(None),
        }
    }

    /// Remove omap entry `name`; returns whether it existed
    pub fn omap_remove(&self, oid: &ObjectIdentity, name: &[u8]) -> Result<bool> {
        match self.omap_id(oid, false)? {
            Some(lid) if !name.is_empty() => self.medium.delete(&omap_key(lid, name)?),
            _ => Ok(false),
        }
    }

    /// All omap entries of `oid`, ordered by name
    pub fn omap_list(&self, oid: &ObjectIdentity) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let lid = match self.omap_id(oid, false)? {
            Some(lid) => lid,
            None => return Ok(Vec::new()),
        };

        let mut entries = Vec::new();
        for (key, value) in self.medium.scan_prefix(&omap_entries_prefix(lid)?)? {
            if let (_, OmapEntry::Entry(name)) = parse_omap_key(&key)? {
                entries.push((name, value));
            }
        }
        Ok(entries)
    }

    pub fn omap_set_header(&self, oid: &ObjectIdentity, value: &[u8]) -> Result<()> {
        let lid = self.omap_id(oid, true)?.ok_or_else(|| not_found(oid))?;
        self.medium.put(&omap_header_key(lid)?, value)
    }

    pub fn omap_header(&self, oid: &ObjectIdentity) -> Result<Option<Vec<u8>>> {
        match self.omap_id(oid, false)? {
            Some(lid) => self.medium.get(&omap_header_key(lid)?),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn medium(&self) -> &Arc<M> {
        &self.medium
    }

    /// Number of objects currently cached
    pub fn open_objects(&self) -> usize {
        self.objects.lock().len()
    }

    /// Resident page count of an open object (0 if not cached)
    pub fn resident_pages(&self, oid: &ObjectIdentity) -> usize {
        match self.objects.lock().get(oid) {
            Some(handle) => handle.lock().data.pages().len(),
            None => 0,
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Fetch the cached handle of `oid`, loading or creating it
    ///
    /// The onode is read without holding `objects`; if another thread cached
    /// the object meanwhile, its handle wins.
    fn handle(&self, oid: &ObjectIdentity, create: bool) -> Result<ObjectHandle> {
        if let Some(handle) = self.objects.lock().get(oid) {
            return Ok(Arc::clone(handle));
        }

        let page_size = self.config.page_size;
        let obj = match self.medium.get(&onode_key(oid)?)? {
            Some(value) => {
                let record: OnodeRecord = decode_record(&value)?;
                trace!(%oid, data_len = record.data_len, "onode loaded");
                OpenObject {
                    data: DataObject::with_len(page_size, record.data_len)?,
                    omap_id: record.omap_id,
                    dirty_pages: BTreeSet::new(),
                    onode_dirty: false,
                }
            }
            None if create => OpenObject {
                data: DataObject::new(page_size)?,
                omap_id: None,
                dirty_pages: BTreeSet::new(),
                onode_dirty: true,
            },
            None => return Err(not_found(oid)),
        };

        let mut objects = self.objects.lock();
        let handle = objects
            .entry(oid.clone())
            .or_insert_with(|| Arc::new(Mutex::new(obj)));
        Ok(Arc::clone(handle))
    }

    /// Loader reading the pages of `oid` from data-block keys
    fn page_loader<'a>(
        &'a self,
        oid: &'a ObjectIdentity,
    ) -> impl FnMut(&mut [u8], u64) -> Result<Option<usize>> + 'a {
        move |buf: &mut [u8], offset: u64| self.load_page(oid, buf, offset)
    }

    fn load_page(&self, oid: &ObjectIdentity, buf: &mut [u8], offset: u64) -> Result<Option<usize>> {
        let key = data_key(oid, self.block_index(offset)?)?;
        let value = match self.medium.get(&key)? {
            Some(value) => value,
            None => return Ok(None),
        };

        let payload = unframe_page(&value, self.config.verify_checksums).map_err(|e| {
            warn!(%oid, offset, error = %e, "bad page value");
            e
        })?;
        if payload.len() > buf.len() {
            return Err(KvsError::Corruption(format!(
                "page at {} holds {} bytes, page size is {}",
                offset,
                payload.len(),
                buf.len()
            )));
        }
        buf[..payload.len()].copy_from_slice(payload);
        Ok(Some(payload.len()))
    }

    fn flush_object(&self, oid: &ObjectIdentity, obj: &mut OpenObject) -> Result<()> {
        let mut written = 0usize;
        while let Some(offset) = obj.dirty_pages.pop_first() {
            let page = match obj.data.pages().page(offset) {
                Some(page) => page,
                None => continue,
            };
            let stored = data_key(oid, self.block_index(offset)?)
                .and_then(|key| self.medium.put(&key, &frame_page(&page.read())));
            if let Err(e) = stored {
                obj.dirty_pages.insert(offset);
                return Err(e);
            }
            written += 1;
        }

        if obj.onode_dirty {
            self.persist_onode(oid, obj)?;
        }
        if written > 0 {
            debug!(%oid, pages = written, "flushed");
        }
        Ok(())
    }

    fn persist_onode(&self, oid: &ObjectIdentity, obj: &mut OpenObject) -> Result<()> {
        self.medium
            .put(&onode_key(oid)?, &encode_record(&obj.record())?)?;
        obj.onode_dirty = false;
        Ok(())
    }

    /// Omap object id of `oid`, allocating one when `allocate` is set
    fn omap_id(&self, oid: &ObjectIdentity, allocate: bool) -> Result<Option<u64>> {
        let handle = self.handle(oid, allocate)?;
        let mut obj = handle.lock();
        if obj.omap_id.is_none() && allocate {
            let lid = self.allocate_omap_id()?;
            trace!(%oid, lid, "omap allocated");
            obj.omap_id = Some(lid);
            self.persist_onode(oid, &mut obj)?;
        }
        Ok(obj.omap_id)
    }

    fn allocate_omap_id(&self) -> Result<u64> {
        let mut superblock = self.superblock.lock();
        let lid = superblock.next_omap_id;
        superblock.next_omap_id += 1;
        self.medium
            .put(&superblock_key()?, &encode_record(&*superblock)?)?;
        Ok(lid)
    }

    fn clear_omap(&self, lid: u64) -> Result<()> {
        for (key, _) in self.medium.scan_prefix(&omap_entries_prefix(lid)?)? {
            self.medium.delete(&key)?;
        }
        self.medium.delete(&omap_header_key(lid)?)?;
        Ok(())
    }

    /// Data-block index of the page at `offset`
    fn block_index(&self, offset: u64) -> Result<u16> {
        let index = offset / self.config.page_size as u64;
        u16::try_from(index).map_err(|_| KvsError::ObjectTooLarge {
            offset,
            limit: self.config.max_object_size(),
        })
    }

    fn check_bounds(&self, offset: u64, len: u64) -> Result<()> {
        let end = offset
            .checked_add(len)
            .ok_or(KvsError::InvalidRange { offset, len })?;
        let limit = self.config.max_object_size();
        if end > limit {
            return Err(KvsError::ObjectTooLarge { offset: end, limit });
        }
        Ok(())
    }
}

fn not_found(oid: &ObjectIdentity) -> KvsError {
    KvsError::ObjectNotFound(oid.to_string())
}
