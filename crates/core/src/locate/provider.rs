//! Object location provider.
//!
//! Answers "where is object N G" and "have we already decoded it" for the
//! rest of the parser. It works before the merged table exists: the table is
//! read through a supplier that may return `None` during bootstrap.

use crate::model::objects::{IndirectObject, ObjectId};
use crate::xref::{CrossReferenceTable, scan_object_headers};
use bytes::Bytes;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use tracing::debug;

/// Deferred access to "the table so far".
pub type TableSupplier = Box<dyn Fn() -> Option<Arc<CrossReferenceTable>> + Send + Sync>;

/// Decoded objects with optional LRU eviction.
struct ObjectCache {
    capacity: Option<usize>,
    map: IndexMap<ObjectId, Arc<IndirectObject>>,
}

impl ObjectCache {
    fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            map: IndexMap::new(),
        }
    }

    fn get(&mut self, id: &ObjectId) -> Option<Arc<IndirectObject>> {
        let index = self.map.get_index_of(id)?;
        let value = Arc::clone(self.map.get_index(index)?.1);
        if index + 1 != self.map.len() {
            self.map.move_index(index, self.map.len() - 1);
        }
        Some(value)
    }

    fn insert(&mut self, value: Arc<IndirectObject>, force: bool) -> bool {
        if self.capacity == Some(0) {
            return false;
        }
        let id = value.id;
        if self.map.contains_key(&id) {
            if !force {
                return false;
            }
            self.map.shift_remove(&id);
        }
        self.map.insert(id, value);
        if let Some(capacity) = self.capacity
            && self.map.len() > capacity
        {
            self.map.shift_remove_index(0);
        }
        true
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Cached id-to-offset and id-to-object lookups for one document.
pub struct ObjectLocationProvider {
    offsets: RwLock<HashMap<ObjectId, u64>>,
    objects: Mutex<ObjectCache>,
    supplier: TableSupplier,
    scan_source: Option<Bytes>,
    scanned: OnceLock<HashMap<ObjectId, u64>>,
}

impl ObjectLocationProvider {
    pub fn new(supplier: TableSupplier, cache_capacity: Option<usize>) -> Self {
        Self {
            offsets: RwLock::new(HashMap::new()),
            objects: Mutex::new(ObjectCache::new(cache_capacity)),
            supplier,
            scan_source: None,
            scanned: OnceLock::new(),
        }
    }

    /// Fall back to scanning `data` for object headers when an identifier is
    /// neither cached nor in the table. The scan runs at most once.
    pub fn with_object_scan(mut self, data: Bytes) -> Self {
        self.scan_source = Some(data);
        self
    }

    /// Byte offset of `id`, if it can be located.
    pub fn try_get_offset(&self, id: ObjectId) -> Option<u64> {
        if let Ok(offsets) = self.offsets.read()
            && let Some(&offset) = offsets.get(&id)
        {
            return Some(offset);
        }

        if let Some(table) = (self.supplier)()
            && let Some(offset) = table.offset_of(&id)
        {
            self.remember(id, offset);
            return Some(offset);
        }

        let data = self.scan_source.as_ref()?;
        let scanned = self.scanned.get_or_init(|| {
            debug!("scanning file for object headers");
            scan_object_headers(data)
        });
        let offset = *scanned.get(&id)?;
        debug!(%id, offset, "object located by header scan");
        self.remember(id, offset);
        Some(offset)
    }

    /// Record or replace the offset of `id`.
    pub fn update_offset(&self, id: ObjectId, offset: u64) {
        if let Ok(mut offsets) = self.offsets.write() {
            offsets.insert(id, offset);
        }
    }

    fn remember(&self, id: ObjectId, offset: u64) {
        if let Ok(mut offsets) = self.offsets.write() {
            offsets.entry(id).or_insert(offset);
        }
    }

    /// A previously decoded object. A miss only means it must be read again.
    pub fn try_get_cached(&self, id: ObjectId) -> Option<Arc<IndirectObject>> {
        self.objects.lock().ok()?.get(&id)
    }

    /// Store a decoded object. Without `force` an object already cached
    /// under the same identifier is kept. Returns whether `object` was
    /// stored.
    pub fn cache(&self, object: Arc<IndirectObject>, force: bool) -> bool {
        self.objects
            .lock()
            .map(|mut cache| cache.insert(object, force))
            .unwrap_or(false)
    }

    /// Number of identifiers with a known offset.
    pub fn known_offsets(&self) -> usize {
        self.offsets.read().map(|o| o.len()).unwrap_or(0)
    }

    /// Number of decoded objects currently cached.
    pub fn cached_objects(&self) -> usize {
        self.objects.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for ObjectLocationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectLocationProvider")
            .field("known_offsets", &self.known_offsets())
            .field("cached_objects", &self.cached_objects())
            .field("object_scan", &self.scan_source.is_some())
            .finish()
    }
}
