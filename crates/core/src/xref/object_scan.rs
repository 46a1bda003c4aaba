//! Last-resort index built by scanning for `N G obj` headers.

use super::part::XrefEntry;
use super::table::CrossReferenceTable;
use crate::model::objects::{Dictionary, ObjectId};
use crate::parser::{PdfScanner, TokenScanner};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::collections::HashMap;

lazy_static! {
    /// `N G obj` object header
    static ref OBJECT_HEADER: Regex = Regex::new(r"(\d+)\s+(\d+)\s+obj\b").unwrap();
}

const TRAILER: &[u8] = b"trailer";

/// Offsets of every object header in `data`; a later definition of the same
/// identifier replaces an earlier one.
pub fn scan_object_headers(data: &[u8]) -> HashMap<ObjectId, u64> {
    let mut offsets = HashMap::new();
    for cap in OBJECT_HEADER.captures_iter(data) {
        let (Some(objid), Some(genno), Some(whole)) =
            (parse_u32(&cap[1]), parse_u32(&cap[2]), cap.get(0))
        else {
            continue;
        };
        offsets.insert(ObjectId::new(objid, genno), whole.start() as u64);
    }
    offsets
}

/// Rebuild a table from object headers plus the last `trailer` dictionary.
pub fn scan_for_objects(data: &Bytes) -> CrossReferenceTable {
    let entries = scan_object_headers(data)
        .into_iter()
        .map(|(id, offset)| (id, XrefEntry::InFile(offset)))
        .collect();
    CrossReferenceTable::from_scan(entries, find_last_trailer(data).unwrap_or_default())
}

/// Dictionary following the last `trailer` keyword.
pub fn find_last_trailer(data: &Bytes) -> Option<Dictionary> {
    let at = data
        .windows(TRAILER.len())
        .rposition(|w| w == TRAILER)?;
    let mut scanner = PdfScanner::new(data.clone());
    scanner.seek((at + TRAILER.len()) as u64);
    scanner.try_read_token::<Dictionary>()
}

fn parse_u32(digits: &[u8]) -> Option<u32> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_definitions_win() {
        let data = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n2 0 obj 5 endobj\n1 0 obj\n<< /New true >>\nendobj\n";
        let offsets = scan_object_headers(data);
        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets[&ObjectId::new(1, 0)], 46);
        assert_eq!(offsets[&ObjectId::new(2, 0)], 29);
    }

    #[test]
    fn rebuilt_table_carries_last_trailer() {
        let data = Bytes::from_static(
            b"%PDF-1.4\n1 0 obj << >> endobj\ntrailer << /Size 9 >>\ntrailer << /Root 1 0 R >>\n",
        );
        let table = scan_for_objects(&data);
        assert!(table.is_fallback());
        assert_eq!(table.offset_of(&ObjectId::new(1, 0)), Some(9));
        assert_eq!(table.trailer().root(), Some(ObjectId::new(1, 0)));
        assert_eq!(table.trailer().size(), None);
    }

    #[test]
    fn objid_overflow_is_skipped() {
        let offsets = scan_object_headers(b"99999999999 0 obj");
        assert!(offsets.is_empty());
    }
}
