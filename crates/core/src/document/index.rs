//! Document opener - wires the object-location pieces together.
//!
//! Opening a file:
//! 1. build the location provider with a supplier that sees no table yet
//! 2. read the linearization dictionary (advisory)
//! 3. locate `startxref` and resolve the cross-reference chain
//! 4. in lenient mode, rebuild from object headers if the index is empty
//! 5. publish the table to the provider and seed its offsets

use super::linearization::LinearizationParameters;
use crate::error::{PdfError, Result};
use crate::io::{InputBytes, MemoryInputBytes};
use crate::locate::{ObjectLocationProvider, TableSupplier};
use crate::model::objects::{IndirectObject, ObjectId};
use crate::options::ParsingOptions;
use crate::parser::{PdfScanner, read_indirect_object};
use crate::xref::{
    CrossReferenceTable, XrefEntry, find_startxref, load_cross_reference_table, scan_for_objects,
};
use bytes::Bytes;
use memmap2::Mmap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// An opened document: its bytes, merged cross-reference table and object
/// location cache.
pub struct PdfIndex {
    data: Bytes,
    table: Arc<CrossReferenceTable>,
    locations: ObjectLocationProvider,
    linearization: Option<LinearizationParameters>,
    options: ParsingOptions,
}

impl PdfIndex {
    /// Open a document from raw bytes (copied).
    pub fn open<D: AsRef<[u8]>>(data: D, options: &ParsingOptions) -> Result<Self> {
        Self::open_bytes(Bytes::copy_from_slice(data.as_ref()), options)
    }

    /// Open a memory-mapped document.
    pub fn open_mmap(mmap: Mmap, options: &ParsingOptions) -> Result<Self> {
        Self::open_bytes(Bytes::from_owner(mmap), options)
    }

    /// Open a document from shared bytes (zero-copy).
    pub fn open_bytes(data: Bytes, options: &ParsingOptions) -> Result<Self> {
        options.scoped(|| Self::open_inner(data, options))
    }

    fn open_inner(data: Bytes, options: &ParsingOptions) -> Result<Self> {
        let slot: Arc<OnceLock<Arc<CrossReferenceTable>>> = Arc::new(OnceLock::new());
        let supplier: TableSupplier = {
            let slot = Arc::clone(&slot);
            Box::new(move || slot.get().cloned())
        };
        let mut locations =
            ObjectLocationProvider::new(supplier, options.object_cache_capacity);
        if options.lenient && options.scan_missing_objects {
            locations = locations.with_object_scan(data.clone());
        }

        let mut input = MemoryInputBytes::new(data.clone());
        let mut scanner = PdfScanner::new(data.clone());

        let linearization = LinearizationParameters::read(&mut scanner, &locations);
        if let Some(params) = &linearization {
            params.matches_length(input.len());
        }

        let declared = match find_startxref(&mut input, options.lenient)? {
            Some(offset) => offset,
            None => {
                warn!("startxref not found, recovering from end of file");
                i64::try_from(input.len()).unwrap_or(i64::MAX)
            }
        };

        let table = match load_cross_reference_table(&mut input, &mut scanner, declared, options) {
            Ok(table) if !table.is_empty() => table,
            Ok(_) if !options.lenient => return Err(PdfError::NoValidXRef),
            Err(err) if !options.lenient => return Err(err),
            loaded => {
                warn!(
                    error = loaded.as_ref().err().map(tracing::field::display),
                    "cross-reference index unusable, scanning for objects"
                );
                let scanned = scan_for_objects(&data);
                if scanned.is_empty() {
                    return Err(loaded.err().unwrap_or(PdfError::NoValidXRef));
                }
                scanned
            }
        };
        debug!(
            objects = table.len(),
            depth = table.depth(),
            fallback = table.is_fallback(),
            "cross-reference table ready"
        );

        let table = Arc::new(table);
        for (id, entry) in table.entries() {
            if let XrefEntry::InFile(offset) = entry {
                locations.update_offset(*id, *offset);
            }
        }
        let _ = slot.set(Arc::clone(&table));

        Ok(Self {
            data,
            table,
            locations,
            linearization,
            options: options.clone(),
        })
    }

    /// Fetch and cache the object `id`.
    pub fn get_object(&self, id: ObjectId) -> Result<Arc<IndirectObject>> {
        self.options.scoped(|| self.get_object_inner(id))
    }

    fn get_object_inner(&self, id: ObjectId) -> Result<Arc<IndirectObject>> {
        if let Some(object) = self.locations.try_get_cached(id) {
            return Ok(object);
        }
        if let Some(XrefEntry::Compressed { stream_objid, .. }) = self.table.get(&id) {
            return Err(PdfError::ObjectInStream {
                id,
                stream_objid: *stream_objid,
            });
        }
        let Some(offset) = self.locations.try_get_offset(id) else {
            return Err(PdfError::ObjectNotFound(id));
        };

        let mut input = MemoryInputBytes::new(self.data.clone());
        let mut scanner = PdfScanner::new(self.data.clone());
        let object = read_indirect_object(&mut input, &mut scanner, offset)?;
        if object.id != id {
            return Err(PdfError::XRefError {
                offset,
                msg: format!("expected object {id}, found {}", object.id),
            });
        }

        let object = Arc::new(object);
        if !self.locations.cache(Arc::clone(&object), false) {
            // another reader cached it first
            if let Some(cached) = self.locations.try_get_cached(id) {
                return Ok(cached);
            }
        }
        Ok(object)
    }

    /// The document catalog, read through `Root`.
    pub fn catalog(&self) -> Result<Arc<IndirectObject>> {
        let root = self
            .table
            .trailer()
            .root()
            .ok_or_else(|| PdfError::KeyError("Root".into()))?;
        self.get_object(root)
    }

    pub const fn table(&self) -> &Arc<CrossReferenceTable> {
        &self.table
    }

    pub const fn locations(&self) -> &ObjectLocationProvider {
        &self.locations
    }

    pub const fn linearization(&self) -> Option<&LinearizationParameters> {
        self.linearization.as_ref()
    }

    /// Returns the raw PDF bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for PdfIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfIndex")
            .field("len", &self.data.len())
            .field("objects", &self.table.len())
            .field("linearized", &self.linearization.is_some())
            .finish()
    }
}
