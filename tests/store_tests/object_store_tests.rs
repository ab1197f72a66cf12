//! Tests for the object store
//!
//! These tests verify:
//! - Formatting, reopening and superblock validation
//! - Data persistence through flush, eviction and lazy reload
//! - Truncate, clone and remove against persisted pages
//! - Page checksums and object size limits
//! - Omap entries and headers
//! - Concurrent access to distinct and shared objects

use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};
use kvsstore::key::{data_key, onode_key, superblock_key, ObjectIdentity};
use kvsstore::store::{decode_record, Superblock, PAGE_TRAILER_SIZE};
use kvsstore::{Config, KvsError, Medium, MemoryMedium, ObjectStore};

const PAGE_SIZE: usize = 4096;
const PS: u64 = PAGE_SIZE as u64;

/// Helper to open a store on a fresh in-memory medium
fn create_store() -> (Arc<MemoryMedium>, ObjectStore<MemoryMedium>) {
    let medium = Arc::new(MemoryMedium::new());
    let store = ObjectStore::open(Config::default(), Arc::clone(&medium)).unwrap();
    (medium, store)
}

/// Helper to reopen a store on an existing medium
fn reopen(medium: &Arc<MemoryMedium>) -> ObjectStore<MemoryMedium> {
    ObjectStore::open(Config::default(), Arc::clone(medium)).unwrap()
}

fn object(name: &str) -> ObjectIdentity {
    ObjectIdentity::new(1, name).with_hash(0xabcd_0123)
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
}

fn is_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

/// Medium that rejects deletes of one key
struct RejectingDeletes {
    inner: MemoryMedium,
    key: Vec<u8>,
}

impl Medium for RejectingDeletes {
    fn get(&self, key: &[u8]) -> kvsstore::Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> kvsstore::Result<()> {
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> kvsstore::Result<bool> {
        if key == self.key.as_slice() {
            return Err(KvsError::Medium("delete rejected".to_string()));
        }
        self.inner.delete(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> kvsstore::Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.inner.scan_prefix(prefix)
    }
}

/// Medium whose reads of one key block until released
struct GatedMedium {
    inner: Arc<MemoryMedium>,
    gate: Vec<u8>,
    entered: Sender<()>,
    release: Receiver<()>,
}

impl Medium for GatedMedium {
    fn get(&self, key: &[u8]) -> kvsstore::Result<Option<Vec<u8>>> {
        if key == self.gate.as_slice() {
            self.entered.send(()).unwrap();
            self.release.recv().unwrap();
        }
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> kvsstore::Result<()> {
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> kvsstore::Result<bool> {
        self.inner.delete(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> kvsstore::Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.inner.scan_prefix(prefix)
    }
}

fn has_block(medium: &MemoryMedium, oid: &ObjectIdentity, block: u16) -> bool {
    medium
        .get(&data_key(oid, block).unwrap())
        .unwrap()
        .is_some()
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_formats_empty_medium() {
    let (medium, store) = create_store();

    assert_eq!(medium.len(), 1);
    let value = medium.get(&superblock_key().unwrap()).unwrap().unwrap();
    let superblock: Superblock = decode_record(&value).unwrap();
    assert_eq!(superblock, Superblock::new(PS));
    assert_eq!(store.config().page_size, PAGE_SIZE);
}

#[test]
fn test_open_rejects_page_size_mismatch() {
    let (medium, store) = create_store();
    store.close().unwrap();

    let config = Config::builder().page_size(8192).build();
    let result = ObjectStore::open(config, medium);
    assert!(matches!(result, Err(KvsError::Config(_))));
}

#[test]
fn test_open_rejects_invalid_config() {
    let medium = Arc::new(MemoryMedium::new());

    for page_size in [3000, 256, 2 * 1024 * 1024] {
        let config = Config::builder().page_size(page_size).build();
        let result = ObjectStore::open(config, Arc::clone(&medium));
        assert!(matches!(result, Err(KvsError::Config(_))), "{}", page_size);
    }
    assert!(medium.is_empty());
}

#[test]
fn test_open_rejects_corrupt_superblock() {
    let medium = Arc::new(MemoryMedium::new());
    medium.put(&superblock_key().unwrap(), &[1, 2]).unwrap();

    let result = ObjectStore::open(Config::default(), medium);
    assert!(matches!(result, Err(KvsError::Corruption(_))));
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_create_persists_onode() {
    let (medium, store) = create_store();
    let oid = object("created");

    store.create(&oid).unwrap();

    assert!(medium.get(&onode_key(&oid).unwrap()).unwrap().is_some());
    let store = reopen(&medium);
    assert!(store.exists(&oid).unwrap());
    assert_eq!(store.len(&oid).unwrap(), 0);
}

#[test]
fn test_missing_object_errors() {
    let (_medium, store) = create_store();
    let oid = object("missing");

    assert!(!store.exists(&oid).unwrap());
    assert!(matches!(store.read(&oid, 0, 10), Err(KvsError::ObjectNotFound(_))));
    assert!(matches!(store.len(&oid), Err(KvsError::ObjectNotFound(_))));
    assert!(matches!(store.truncate(&oid, 0), Err(KvsError::ObjectNotFound(_))));
    assert!(matches!(store.remove(&oid), Err(KvsError::ObjectNotFound(_))));
    assert_eq!(store.open_objects(), 0);
}

// =============================================================================
// Read / Write Tests
// =============================================================================

#[test]
fn test_write_then_read() {
    let (_medium, store) = create_store();
    let oid = object("rw");
    let data = pattern(10_000, 1);

    store.write(&oid, 500, &data).unwrap();

    assert_eq!(store.len(&oid).unwrap(), 10_500);
    assert_eq!(&store.read(&oid, 500, 10_000).unwrap()[..], data.as_slice());
    assert!(is_zero(&store.read(&oid, 0, 500).unwrap()));
}

#[test]
fn test_read_clamped_to_length() {
    let (_medium, store) = create_store();
    let oid = object("clamp");
    store.write(&oid, 0, &[9u8; 100]).unwrap();

    assert_eq!(store.read(&oid, 50, 1000).unwrap().len(), 50);
    assert!(store.read(&oid, 100, 10).unwrap().is_empty());
    assert!(store.read(&oid, 5000, 10).unwrap().is_empty());
}

#[test]
fn test_unflushed_writes_stay_in_memory() {
    let (medium, store) = create_store();
    let oid = object("dirty");

    store.write(&oid, 0, b"pending").unwrap();

    assert_eq!(medium.len(), 1);
    assert!(store.exists(&oid).unwrap());
}

#[test]
fn test_flush_writes_pages_and_onode() {
    let (medium, store) = create_store();
    let oid = object("flushed");

    store.write(&oid, 0, &pattern(3 * PAGE_SIZE - 100, 2)).unwrap();
    store.flush(&oid).unwrap();

    for block in 0..3 {
        let value = medium.get(&data_key(&oid, block).unwrap()).unwrap().unwrap();
        assert_eq!(value.len(), PAGE_SIZE + PAGE_TRAILER_SIZE);
    }
    assert!(!has_block(&medium, &oid, 3));
    assert!(medium.get(&onode_key(&oid).unwrap()).unwrap().is_some());
    // superblock + onode + three pages
    assert_eq!(medium.len(), 5);
}

#[test]
fn test_data_survives_reopen() {
    let (medium, store) = create_store();
    let oid = object("durable").with_namespace("ns").with_key("locator");
    let data = pattern(9000, 3);

    store.write(&oid, 1000, &data).unwrap();
    store.close().unwrap();

    let store = reopen(&medium);
    assert_eq!(store.len(&oid).unwrap(), 10_000);
    assert_eq!(&store.read(&oid, 1000, 9000).unwrap()[..], data.as_slice());
    assert!(is_zero(&store.read(&oid, 0, 1000).unwrap()));
}

#[test]
fn test_evict_and_lazy_reload() {
    let (_medium, store) = create_store();
    let oid = object("lazy");
    let data = pattern(3 * PAGE_SIZE, 4);

    store.write(&oid, 0, &data).unwrap();
    assert_eq!(store.resident_pages(&oid), 3);

    store.evict(&oid).unwrap();
    assert_eq!(store.open_objects(), 0);

    let read = store.read(&oid, PS + 10, 20).unwrap();
    assert_eq!(&read[..], &data[PAGE_SIZE + 10..PAGE_SIZE + 30]);
    assert_eq!(store.resident_pages(&oid), 1);
}

#[test]
fn test_holes_are_not_persisted() {
    let (medium, store) = create_store();
    let oid = object("sparse");

    store.write(&oid, 0, b"a").unwrap();
    store.write(&oid, 2 * PS, b"b").unwrap();
    store.evict(&oid).unwrap();

    assert!(has_block(&medium, &oid, 0));
    assert!(!has_block(&medium, &oid, 1));
    assert!(has_block(&medium, &oid, 2));

    let read = store.read(&oid, 0, 2 * PS + 1).unwrap();
    assert_eq!(read[0], b'a');
    assert!(is_zero(&read[1..2 * PAGE_SIZE]));
    assert_eq!(read[2 * PAGE_SIZE], b'b');
    assert_eq!(store.resident_pages(&oid), 2);
}

#[test]
fn test_zero_range() {
    let (_medium, store) = create_store();
    let oid = object("zeroed");

    store.write(&oid, 0, &[0xffu8; 2 * PAGE_SIZE]).unwrap();
    store.zero(&oid, 100, 200).unwrap();
    store.zero(&oid, 3 * PS, 10).unwrap();

    assert_eq!(store.len(&oid).unwrap(), 3 * PS + 10);
    let read = store.read(&oid, 0, 300).unwrap();
    assert!(read[..100].iter().all(|&b| b == 0xff));
    assert!(is_zero(&read[100..300]));
}

// =============================================================================
// Truncate Tests
// =============================================================================

#[test]
fn test_truncate_deletes_persisted_pages() {
    let (medium, store) = create_store();
    let oid = object("shrink");
    let data = pattern(3 * PAGE_SIZE, 5);

    store.write(&oid, 0, &data).unwrap();
    store.flush(&oid).unwrap();

    store.truncate(&oid, 100).unwrap();

    assert!(has_block(&medium, &oid, 0));
    assert!(!has_block(&medium, &oid, 1));
    assert!(!has_block(&medium, &oid, 2));

    store.evict(&oid).unwrap();
    assert_eq!(store.len(&oid).unwrap(), 100);
    assert_eq!(&store.read(&oid, 0, 100).unwrap()[..], &data[..100]);
}

#[test]
fn test_truncate_scenario_across_reload() {
    let (_medium, store) = create_store();
    let oid = object("scenario");
    let value = pattern(6000, 6);

    store.write(&oid, 2000, &value).unwrap();
    assert_eq!(store.len(&oid).unwrap(), 8000);
    store.evict(&oid).unwrap();

    store.truncate(&oid, 3000).unwrap();
    store.evict(&oid).unwrap();

    let read = store.read(&oid, 0, 3000).unwrap();
    assert!(is_zero(&read[..2000]));
    assert_eq!(&read[2000..], &value[..1000]);

    // regrow into the truncated page: the old tail must not reappear
    store.write(&oid, 5000, b"z").unwrap();
    let read = store.read(&oid, 3000, 2000).unwrap();
    assert!(is_zero(&read));
}

#[test]
fn test_truncate_drops_unflushed_pages() {
    let (medium, store) = create_store();
    let oid = object("discard");

    store.write(&oid, 0, &[1u8; 4 * PAGE_SIZE]).unwrap();
    store.truncate(&oid, PS).unwrap();
    store.flush(&oid).unwrap();

    assert!(has_block(&medium, &oid, 0));
    assert!(!has_block(&medium, &oid, 1));
    assert_eq!(store.resident_pages(&oid), 1);
}

#[test]
fn test_truncate_tail_load_failure_still_persists_length() {
    let (medium, store) = create_store();
    let oid = object("bad-tail");
    store.write(&oid, 0, &pattern(8000, 2)).unwrap();
    store.evict(&oid).unwrap();

    let key = data_key(&oid, 0).unwrap();
    let mut value = medium.get(&key).unwrap().unwrap();
    value[0] ^= 0xff;
    medium.put(&key, &value).unwrap();

    let result = store.truncate(&oid, 3000);
    assert!(matches!(result, Err(KvsError::Corruption(_))));
    assert_eq!(store.len(&oid).unwrap(), 3000);
    assert!(!has_block(&medium, &oid, 1));

    store.evict(&oid).unwrap();
    assert_eq!(reopen(&medium).len(&oid).unwrap(), 3000);
}

// =============================================================================
// Clone Tests
// =============================================================================

#[test]
fn test_clone_between_objects() {
    let (medium, store) = create_store();
    let src = object("clone-src");
    let dst = object("clone-dst");

    store.write(&src, 0, &[b'a'; 100]).unwrap();
    store.write(&src, 2 * PS, &[b'b'; 100]).unwrap();
    store.evict(&src).unwrap();

    let len = store.len(&src).unwrap();
    store.clone_range(&src, &dst, 0, len, 0).unwrap();

    assert_eq!(store.len(&dst).unwrap(), len);
    assert_eq!(
        store.read(&dst, 0, len).unwrap(),
        store.read(&src, 0, len).unwrap()
    );

    store.flush(&dst).unwrap();
    // the source hole is recorded as an explicit zero page
    for block in 0..3 {
        assert!(has_block(&medium, &dst, block));
    }
}

#[test]
fn test_clone_with_offsets_into_existing_object() {
    let (_medium, store) = create_store();
    let src = object("b-src");
    let dst = object("a-dst");
    let data = pattern(20_000, 7);

    store.write(&src, 0, &data).unwrap();
    store.write(&dst, 0, &[0x55u8; 8000]).unwrap();

    store.clone_range(&src, &dst, 1000, 6000, 5555).unwrap();

    let read = store.read(&dst, 0, 11_555).unwrap();
    assert!(read[..5555].iter().all(|&b| b == 0x55));
    assert_eq!(&read[5555..], &data[1000..7000]);
}

#[test]
fn test_clone_within_one_object() {
    let (_medium, store) = create_store();
    let oid = object("self-clone");

    store.write(&oid, 0, b"abc").unwrap();
    store.clone_range(&oid, &oid, 0, 3, 10_000).unwrap();

    assert_eq!(store.len(&oid).unwrap(), 10_003);
    assert_eq!(&store.read(&oid, 10_000, 3).unwrap()[..], b"abc");
}

#[test]
fn test_clone_missing_source() {
    let (_medium, store) = create_store();
    let result = store.clone_range(&object("nope"), &object("dst"), 0, 10, 0);
    assert!(matches!(result, Err(KvsError::ObjectNotFound(_))));
}

// =============================================================================
// Remove Tests
// =============================================================================

#[test]
fn test_remove_deletes_every_record() {
    let (medium, store) = create_store();
    let oid = object("doomed");

    store.write(&oid, 0, &pattern(3 * PAGE_SIZE, 8)).unwrap();
    store.omap_set(&oid, b"attr", b"value").unwrap();
    store.omap_set_header(&oid, b"header").unwrap();
    store.flush(&oid).unwrap();
    store.write(&oid, 5 * PS, b"unflushed").unwrap();

    store.remove(&oid).unwrap();

    assert_eq!(medium.keys(), vec![superblock_key().unwrap().to_vec()]);
    assert!(!store.exists(&oid).unwrap());
    assert_eq!(store.open_objects(), 0);
    assert!(matches!(store.read(&oid, 0, 1), Err(KvsError::ObjectNotFound(_))));
}

#[test]
fn test_remove_leaves_other_objects() {
    let (medium, store) = create_store();
    let keep = object("keep");
    let gone = object("gone");

    store.write(&keep, 0, b"keep").unwrap();
    store.write(&gone, 0, b"gone").unwrap();
    store.flush_all().unwrap();

    store.remove(&gone).unwrap();

    assert!(has_block(&medium, &keep, 0));
    assert_eq!(&store.read(&keep, 0, 4).unwrap()[..], b"keep");
}

#[test]
fn test_remove_reports_failed_page_delete() {
    let oid = object("stuck");
    let medium = Arc::new(RejectingDeletes {
        inner: MemoryMedium::new(),
        key: data_key(&oid, 1).unwrap().to_vec(),
    });
    let store = ObjectStore::open(Config::default(), Arc::clone(&medium)).unwrap();
    store.write(&oid, 0, &pattern(3 * PAGE_SIZE, 4)).unwrap();
    store.flush(&oid).unwrap();

    let result = store.remove(&oid);

    assert!(matches!(result, Err(KvsError::Remove { offset, .. }) if offset == PS));
    assert!(store.exists(&oid).unwrap());
    assert!(medium.get(&onode_key(&oid).unwrap()).unwrap().is_some());
}

// =============================================================================
// Integrity and Limit Tests
// =============================================================================

/// Helper: persist one page of `oid` and flip a byte of its stored value
fn corrupt_first_page(medium: &MemoryMedium, store: &ObjectStore<MemoryMedium>, oid: &ObjectIdentity) {
    store.write(oid, 0, &[7u8; 64]).unwrap();
    store.evict(oid).unwrap();

    let key = data_key(oid, 0).unwrap();
    let mut value = medium.get(&key).unwrap().unwrap();
    value[0] ^= 0xff;
    medium.put(&key, &value).unwrap();
}

#[test]
fn test_checksum_mismatch_detected() {
    let (medium, store) = create_store();
    let oid = object("corrupt");
    corrupt_first_page(&medium, &store, &oid);

    let result = store.read(&oid, 0, 64);
    assert!(matches!(result, Err(KvsError::Corruption(_))));
}

#[test]
fn test_checksum_verification_can_be_disabled() {
    let medium = Arc::new(MemoryMedium::new());
    let config = Config::builder().verify_checksums(false).build();
    let store = ObjectStore::open(config, Arc::clone(&medium)).unwrap();
    let oid = object("unverified");
    corrupt_first_page(&medium, &store, &oid);

    let read = store.read(&oid, 0, 64).unwrap();
    assert_eq!(read[0], 7 ^ 0xff);
    assert!(read[1..].iter().all(|&b| b == 7));
}

#[test]
fn test_short_page_value_is_corrupt() {
    let (medium, store) = create_store();
    let oid = object("short");
    store.write(&oid, 0, b"x").unwrap();
    store.evict(&oid).unwrap();

    medium.put(&data_key(&oid, 0).unwrap(), &[1, 2]).unwrap();

    assert!(matches!(store.read(&oid, 0, 1), Err(KvsError::Corruption(_))));
}

#[test]
fn test_object_size_limit() {
    let (_medium, store) = create_store();
    let oid = object("huge");
    let limit = store.config().max_object_size();

    let result = store.write(&oid, limit, b"x");
    assert!(matches!(result, Err(KvsError::ObjectTooLarge { .. })));
    assert!(matches!(
        store.zero(&oid, limit - 10, 11),
        Err(KvsError::ObjectTooLarge { .. })
    ));
    assert!(matches!(
        store.write(&oid, u64::MAX, b"x"),
        Err(KvsError::ObjectTooLarge { .. }) | Err(KvsError::InvalidRange { .. })
    ));
}

#[test]
fn test_last_addressable_page() {
    let medium = Arc::new(MemoryMedium::new());
    let config = Config::builder().page_size(512).build();
    let store = ObjectStore::open(config, Arc::clone(&medium)).unwrap();
    let oid = object("edge");
    let limit = store.config().max_object_size();

    store.write(&oid, limit - 1, b"z").unwrap();
    store.flush(&oid).unwrap();

    assert!(has_block(&medium, &oid, u16::MAX));
    assert_eq!(store.len(&oid).unwrap(), limit);
}

#[test]
fn test_oversized_name_rejected() {
    let (medium, store) = create_store();
    let oid = ObjectIdentity::new(1, vec![b'n'; 240]);

    assert!(matches!(
        store.write(&oid, 0, b"data"),
        Err(KvsError::KeyTooLong { .. })
    ));
    assert_eq!(store.open_objects(), 0);
    assert_eq!(medium.len(), 1);
}

// =============================================================================
// Omap Tests
// =============================================================================

#[test]
fn test_omap_set_get_remove() {
    let (_medium, store) = create_store();
    let oid = object("omap");

    store.omap_set(&oid, b"key", b"v1").unwrap();
    assert_eq!(store.omap_get(&oid, b"key").unwrap(), Some(b"v1".to_vec()));

    store.omap_set(&oid, b"key", b"v2").unwrap();
    assert_eq!(store.omap_get(&oid, b"key").unwrap(), Some(b"v2".to_vec()));

    assert!(store.omap_remove(&oid, b"key").unwrap());
    assert!(!store.omap_remove(&oid, b"key").unwrap());
    assert_eq!(store.omap_get(&oid, b"key").unwrap(), None);
}

#[test]
fn test_omap_set_creates_object() {
    let (medium, store) = create_store();
    let oid = object("omap-only");

    store.omap_set(&oid, b"k", b"v").unwrap();

    assert!(medium.get(&onode_key(&oid).unwrap()).unwrap().is_some());
    assert_eq!(store.len(&oid).unwrap(), 0);
}

#[test]
fn test_omap_list_is_ordered() {
    let (_medium, store) = create_store();
    let oid = object("ordered");

    for name in [&b"b"[..], b"~x", b"a\0", b"a", b"#"] {
        store.omap_set(&oid, name, name).unwrap();
    }
    store.omap_set_header(&oid, b"hdr").unwrap();

    let names: Vec<Vec<u8>> = store
        .omap_list(&oid)
        .unwrap()
        .into_iter()
        .map(|(name, value)| {
            assert_eq!(name, value);
            name
        })
        .collect();

    assert_eq!(
        names,
        vec![b"#".to_vec(), b"a".to_vec(), b"a\0".to_vec(), b"b".to_vec(), b"~x".to_vec()]
    );
    assert_eq!(store.omap_header(&oid).unwrap(), Some(b"hdr".to_vec()));
}

#[test]
fn test_omap_isolated_per_object() {
    let (_medium, store) = create_store();
    let a = object("omap-a");
    let b = object("omap-b");

    store.omap_set(&a, b"shared", b"from a").unwrap();
    store.omap_set(&b, b"shared", b"from b").unwrap();

    assert_eq!(store.omap_get(&a, b"shared").unwrap(), Some(b"from a".to_vec()));
    assert_eq!(store.omap_get(&b, b"shared").unwrap(), Some(b"from b".to_vec()));
    assert_eq!(store.omap_list(&a).unwrap().len(), 1);
}

#[test]
fn test_omap_survives_reopen() {
    let (medium, store) = create_store();
    let old = object("omap-old");
    store.omap_set(&old, b"k", b"v").unwrap();
    store.close().unwrap();

    let store = reopen(&medium);
    assert_eq!(store.omap_get(&old, b"k").unwrap(), Some(b"v".to_vec()));

    // a new object must not reuse the old omap id
    let new = object("omap-new");
    store.omap_set(&new, b"k2", b"v2").unwrap();
    assert_eq!(store.omap_list(&old).unwrap(), vec![(b"k".to_vec(), b"v".to_vec())]);
}

#[test]
fn test_omap_without_entries() {
    let (_medium, store) = create_store();
    let oid = object("plain");
    store.write(&oid, 0, b"data").unwrap();

    assert!(store.omap_list(&oid).unwrap().is_empty());
    assert_eq!(store.omap_get(&oid, b"k").unwrap(), None);
    assert_eq!(store.omap_header(&oid).unwrap(), None);
    assert!(!store.omap_remove(&oid, b"k").unwrap());
}

#[test]
fn test_omap_rejects_empty_name() {
    let (_medium, store) = create_store();
    let result = store.omap_set(&object("o"), b"", b"v");
    assert!(matches!(result, Err(KvsError::MalformedKey(_))));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_on_distinct_objects() {
    let (medium, store) = create_store();
    let store = &store;

    crossbeam::scope(|s| {
        for t in 0..8u8 {
            s.spawn(move |_| {
                let oid = object(&format!("thread-{}", t));
                for i in 0..20u64 {
                    store.write(&oid, i * 1000, &[t + 1; 1000]).unwrap();
                }
                store.flush(&oid).unwrap();
            });
        }
    })
    .unwrap();

    let store = reopen(&medium);
    for t in 0..8u8 {
        let oid = object(&format!("thread-{}", t));
        let read = store.read(&oid, 0, 20_000).unwrap();
        assert_eq!(read.len(), 20_000);
        assert!(read.iter().all(|&b| b == t + 1));
    }
}

#[test]
fn test_concurrent_cross_clones_do_not_deadlock() {
    let (_medium, store) = create_store();
    let a = object("cross-a");
    let b = object("cross-b");
    store.write(&a, 0, &[1u8; 3 * PAGE_SIZE]).unwrap();
    store.write(&b, 0, &[1u8; 3 * PAGE_SIZE]).unwrap();

    crossbeam::scope(|s| {
        let (store, a, b) = (&store, &a, &b);
        s.spawn(move |_| {
            for _ in 0..50 {
                store.clone_range(a, b, 0, PS, PS).unwrap();
            }
        });
        s.spawn(move |_| {
            for _ in 0..50 {
                store.clone_range(b, a, PS, PS, 0).unwrap();
            }
        });
    })
    .unwrap();

    assert!(store.read(&a, 0, 3 * PS).unwrap().iter().all(|&x| x == 1));
    assert!(store.read(&b, 0, 3 * PS).unwrap().iter().all(|&x| x == 1));
}

#[test]
fn test_onode_load_does_not_block_cached_objects() {
    let base = Arc::new(MemoryMedium::new());
    let slow = object("slow");
    let fast = object("fast");
    {
        let store = ObjectStore::open(Config::default(), Arc::clone(&base)).unwrap();
        store.write(&slow, 0, b"slow").unwrap();
        store.write(&fast, 0, b"fast").unwrap();
        store.close().unwrap();
    }

    let (entered_tx, entered_rx) = unbounded();
    let (release_tx, release_rx) = unbounded();
    let medium = Arc::new(GatedMedium {
        inner: base,
        gate: onode_key(&slow).unwrap().to_vec(),
        entered: entered_tx,
        release: release_rx,
    });
    let store = ObjectStore::open(Config::default(), medium).unwrap();
    assert_eq!(store.len(&fast).unwrap(), 4);

    crossbeam::scope(|s| {
        let loading = s.spawn(|_| store.len(&slow));
        entered_rx.recv().unwrap();

        // the onode read of `slow` is in flight
        assert_eq!(&store.read(&fast, 0, 4).unwrap()[..], b"fast");

        release_tx.send(()).unwrap();
        assert_eq!(loading.join().unwrap().unwrap(), 4);
    })
    .unwrap();

    assert_eq!(store.open_objects(), 2);
}
