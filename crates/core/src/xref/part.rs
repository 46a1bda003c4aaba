//! One parsed cross-reference section and the builder that produces it.

use crate::model::objects::{Dictionary, ObjectId};
use std::collections::HashMap;

/// Where an object lives, as declared by one xref section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XrefEntry {
    /// Byte offset of `N G obj` in the file.
    InFile(u64),
    /// Stored inside an object stream (type 2 entry of an xref stream).
    Compressed { stream_objid: u32, index: u32 },
}

impl XrefEntry {
    /// The byte offset, for objects stored directly in the file.
    pub const fn offset(&self) -> Option<u64> {
        match self {
            Self::InFile(offset) => Some(*offset),
            Self::Compressed { .. } => None,
        }
    }
}

/// Which syntax a section was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrossReferenceType {
    /// `xref` ... `trailer` table.
    Table,
    /// `/Type /XRef` stream object.
    Stream,
}

/// One self-contained offset segment, produced by parsing exactly one xref
/// table or xref stream.
#[derive(Debug, Clone)]
pub struct CrossReferenceTablePart {
    offsets: HashMap<ObjectId, XrefEntry>,
    self_offset: u64,
    previous_offset: Option<u64>,
    kind: CrossReferenceType,
    tied_to_offset: Option<u64>,
    dictionary: Dictionary,
}

impl CrossReferenceTablePart {
    pub const fn offsets(&self) -> &HashMap<ObjectId, XrefEntry> {
        &self.offsets
    }

    pub fn get(&self, id: &ObjectId) -> Option<&XrefEntry> {
        self.offsets.get(id)
    }

    /// Where this section begins.
    pub const fn self_offset(&self) -> u64 {
        self.self_offset
    }

    /// The `Prev` pointer, if any.
    pub const fn previous_offset(&self) -> Option<u64> {
        self.previous_offset
    }

    pub const fn kind(&self) -> CrossReferenceType {
        self.kind
    }

    /// Offset of the hybrid counterpart describing the same generation.
    pub const fn tied_to_offset(&self) -> Option<u64> {
        self.tied_to_offset
    }

    /// Trailer dictionary (table) or stream dictionary (stream).
    pub const fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Rewrite the section's own offset once its real location is known.
    pub fn fix_offset(&mut self, offset: u64) {
        self.self_offset = offset;
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Accumulates entries while one section is being parsed.
///
/// Entries are first-writer-wins: adding an identifier that is already
/// present is a no-op. `build` does not reset the builder.
#[derive(Debug, Clone)]
pub struct XrefPartBuilder {
    offsets: HashMap<ObjectId, XrefEntry>,
    self_offset: u64,
    previous_offset: Option<u64>,
    kind: CrossReferenceType,
    tied_to_offset: Option<u64>,
    dictionary: Dictionary,
}

impl XrefPartBuilder {
    pub fn new(kind: CrossReferenceType, self_offset: u64) -> Self {
        Self {
            offsets: HashMap::new(),
            self_offset,
            previous_offset: None,
            kind,
            tied_to_offset: None,
            dictionary: Dictionary::new(),
        }
    }

    /// Record an in-file object offset.
    pub fn add(&mut self, objid: u32, genno: u32, offset: u64) {
        self.add_entry(ObjectId::new(objid, genno), XrefEntry::InFile(offset));
    }

    /// Record any entry; returns false when the identifier was already present.
    pub fn add_entry(&mut self, id: ObjectId, entry: XrefEntry) -> bool {
        if self.offsets.contains_key(&id) {
            return false;
        }
        self.offsets.insert(id, entry);
        true
    }

    pub fn set_previous(&mut self, previous: Option<u64>) -> &mut Self {
        self.previous_offset = previous;
        self
    }

    pub fn set_tied_to(&mut self, tied: Option<u64>) -> &mut Self {
        self.tied_to_offset = tied;
        self
    }

    pub fn set_dictionary(&mut self, dictionary: Dictionary) -> &mut Self {
        self.dictionary = dictionary;
        self
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn build(&self) -> CrossReferenceTablePart {
        CrossReferenceTablePart {
            offsets: self.offsets.clone(),
            self_offset: self.self_offset,
            previous_offset: self.previous_offset,
            kind: self.kind,
            tied_to_offset: self.tied_to_offset,
            dictionary: self.dictionary.clone(),
        }
    }
}
