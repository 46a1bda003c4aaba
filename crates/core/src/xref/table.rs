//! The merged cross-reference index of a document.

use super::part::{CrossReferenceTablePart, CrossReferenceType, XrefEntry};
use crate::model::objects::{Dictionary, ObjectId, PDFObject};
use std::collections::HashMap;

/// Trailer keys that describe the xref data itself rather than the document.
const SECTION_KEYS: [&str; 3] = ["Prev", "XRefStm", "Type"];

/// One update generation: the section reached through `Prev` plus, for a
/// hybrid file, the xref stream its `XRefStm` points at.
#[derive(Debug, Clone)]
pub struct Generation {
    pub primary: CrossReferenceTablePart,
    pub tied: Option<CrossReferenceTablePart>,
}

impl Generation {
    pub const fn new(primary: CrossReferenceTablePart) -> Self {
        Self {
            primary,
            tied: None,
        }
    }

    /// Sections in entry-priority order: a tied stream outranks its table.
    fn by_entry_priority(&self) -> impl Iterator<Item = &CrossReferenceTablePart> {
        self.tied.iter().chain(std::iter::once(&self.primary))
    }

    /// Sections in trailer-priority order: the primary section's dictionary
    /// is the real trailer.
    fn by_trailer_priority(&self) -> impl Iterator<Item = &CrossReferenceTablePart> {
        std::iter::once(&self.primary).chain(self.tied.iter())
    }
}

/// Location and back-pointer of one visited section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossReferenceOffset {
    pub offset: u64,
    pub previous: Option<u64>,
    pub kind: CrossReferenceType,
}

/// Typed accessors over the merged trailer dictionary.
#[derive(Debug, Clone, Default)]
pub struct TrailerDictionary {
    dict: Dictionary,
}

impl TrailerDictionary {
    pub const fn new(dict: Dictionary) -> Self {
        Self { dict }
    }

    pub fn get(&self, key: &str) -> Option<&PDFObject> {
        self.dict.get(key)
    }

    pub const fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// The document catalog reference.
    pub fn root(&self) -> Option<ObjectId> {
        self.get("Root").and_then(|v| v.as_ref().ok())
    }

    pub fn info(&self) -> Option<ObjectId> {
        self.get("Info").and_then(|v| v.as_ref().ok())
    }

    pub fn encrypt(&self) -> Option<&PDFObject> {
        self.get("Encrypt")
    }

    pub fn size(&self) -> Option<i64> {
        self.get("Size").and_then(|v| v.as_int().ok())
    }

    /// The two file identifiers, if present.
    pub fn id(&self) -> Option<&[PDFObject]> {
        self.get("ID").and_then(|v| v.as_array().ok()).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }
}

/// Union of every section reached from the trailer.
///
/// An identifier maps to the entry of the first section visited that
/// defines it, so later updates shadow earlier ones.
#[derive(Debug, Clone)]
pub struct CrossReferenceTable {
    entries: HashMap<ObjectId, XrefEntry>,
    trailer: TrailerDictionary,
    chain: Vec<CrossReferenceOffset>,
    generations: usize,
    kind: CrossReferenceType,
    is_fallback: bool,
}

impl CrossReferenceTable {
    /// Merge generations ordered nearest-to-trailer first.
    pub fn from_generations(generations: &[Generation]) -> Self {
        let mut entries = HashMap::new();
        let mut trailer = Dictionary::new();
        let mut chain = Vec::new();

        for generation in generations {
            for part in generation.by_entry_priority() {
                for (id, entry) in part.offsets() {
                    entries.entry(*id).or_insert(*entry);
                }
            }
            for part in generation.by_trailer_priority() {
                chain.push(CrossReferenceOffset {
                    offset: part.self_offset(),
                    previous: part.previous_offset(),
                    kind: part.kind(),
                });
                for (key, value) in part.dictionary() {
                    if !trailer.contains_key(key) {
                        trailer.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        for key in SECTION_KEYS {
            trailer.shift_remove(key);
        }

        Self {
            entries,
            trailer: TrailerDictionary::new(trailer),
            chain,
            generations: generations.len(),
            kind: generations
                .first()
                .map_or(CrossReferenceType::Table, |g| g.primary.kind()),
            is_fallback: false,
        }
    }

    /// Index rebuilt by scanning for object headers.
    pub fn from_scan(entries: HashMap<ObjectId, XrefEntry>, trailer: Dictionary) -> Self {
        Self {
            entries,
            trailer: TrailerDictionary::new(trailer),
            chain: Vec::new(),
            generations: 0,
            kind: CrossReferenceType::Table,
            is_fallback: true,
        }
    }

    pub fn get(&self, id: &ObjectId) -> Option<&XrefEntry> {
        self.entries.get(id)
    }

    /// Byte offset of an object stored directly in the file.
    pub fn offset_of(&self, id: &ObjectId) -> Option<u64> {
        self.get(id).and_then(XrefEntry::offset)
    }

    pub const fn entries(&self) -> &HashMap<ObjectId, XrefEntry> {
        &self.entries
    }

    /// Identifiers in ascending order.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub const fn trailer(&self) -> &TrailerDictionary {
        &self.trailer
    }

    /// Every visited section, nearest to the trailer first.
    pub fn chain(&self) -> &[CrossReferenceOffset] {
        &self.chain
    }

    /// Number of update generations merged.
    pub const fn depth(&self) -> usize {
        self.generations
    }

    /// Syntax of the section the trailer pointed at.
    pub const fn kind(&self) -> CrossReferenceType {
        self.kind
    }

    pub const fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
