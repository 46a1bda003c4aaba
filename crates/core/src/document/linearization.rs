//! Linearization parameter dictionary (ISO 32000 Annex F).
//!
//! Advisory only: absence or a mismatch with the real file never makes
//! opening fail, and reading it never triggers recovery.

use crate::locate::ObjectLocationProvider;
use crate::model::objects::{Dictionary, IndirectObject, ObjectId, PDFObject};
use crate::parser::{TokenScanner, read_object_header};
use std::sync::Arc;
use tracing::debug;

/// The dictionary must begin within this many bytes of the file start.
pub const LINEARIZATION_WINDOW: u64 = 1024;

/// Parameters of a linearized file.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearizationParameters {
    /// Object holding the dictionary.
    pub id: ObjectId,
    /// `Linearized`: format version.
    pub version: f64,
    /// `L`: declared file length.
    pub file_length: u64,
    /// `H`: primary (and optional overflow) hint stream offset/length pairs.
    pub hint_streams: Vec<(u64, u64)>,
    /// `O`: object number of the first page.
    pub first_page_objid: u32,
    /// `E`: end of the first page.
    pub first_page_end: u64,
    /// `N`: number of pages.
    pub page_count: u32,
    /// `T`: offset of the first entry of the main xref table.
    pub main_xref_offset: u64,
    /// `P`: zero-based index of the first page.
    pub first_page_index: u32,
}

impl LinearizationParameters {
    /// Read the parameters from the first object in the file.
    ///
    /// Returns `None` unless every required key is present and numeric. The
    /// scanner is left where it was.
    pub fn read<S: TokenScanner>(scanner: &mut S, locations: &ObjectLocationProvider) -> Option<Self> {
        let restore = scanner.current_position();
        let params = read_first_object(scanner, locations);
        scanner.seek(restore);
        params
    }

    /// Whether `L` matches the real file length.
    pub fn matches_length(&self, actual: u64) -> bool {
        let matches = self.file_length == actual;
        if !matches {
            debug!(
                declared = self.file_length,
                actual, "linearized length differs from file length"
            );
        }
        matches
    }
}

fn read_first_object<S: TokenScanner>(
    scanner: &mut S,
    locations: &ObjectLocationProvider,
) -> Option<LinearizationParameters> {
    scanner.seek(0);
    if !scanner.move_next().ok()? {
        return None;
    }
    let header_at = scanner.current_token_start();
    if header_at > LINEARIZATION_WINDOW {
        return None;
    }
    let id = read_object_header(scanner, header_at).ok()?;
    let dict = scanner.try_read_token::<Dictionary>()?;
    let version = dict.get("Linearized")?.as_num().ok()?;

    let mut values = Values {
        dict: &dict,
        scanner,
        locations,
    };
    let file_length = values.unsigned("L");
    let hint_streams = values.hint_streams();
    let first_page_objid = values.unsigned("O");
    let first_page_end = values.unsigned("E");
    let page_count = values.unsigned("N");
    let main_xref_offset = values.unsigned("T");
    let first_page_index = values.get("P").map_or(Some(0), |p| to_u64(&p));

    let params = LinearizationParameters {
        id,
        version,
        file_length: file_length?,
        hint_streams: hint_streams?,
        first_page_objid: u32::try_from(first_page_objid?).ok()?,
        first_page_end: first_page_end?,
        page_count: u32::try_from(page_count?).ok()?,
        main_xref_offset: main_xref_offset?,
        first_page_index: u32::try_from(first_page_index?).ok()?,
    };
    debug!(?id, pages = params.page_count, "file is linearized");
    Some(params)
}

/// Dictionary values with indirect references resolved.
struct Values<'a, S> {
    dict: &'a Dictionary,
    scanner: &'a mut S,
    locations: &'a ObjectLocationProvider,
}

impl<S: TokenScanner> Values<'_, S> {
    fn get(&mut self, key: &str) -> Option<PDFObject> {
        let dict = self.dict;
        self.resolve(dict.get(key)?)
    }

    fn resolve(&mut self, value: &PDFObject) -> Option<PDFObject> {
        let PDFObject::Ref(id) = value else {
            return Some(value.clone());
        };
        if let Some(cached) = self.locations.try_get_cached(*id) {
            return Some(cached.object.clone());
        }
        let offset = self.locations.try_get_offset(*id)?;
        if read_object_header(&mut *self.scanner, offset).ok()? != *id {
            return None;
        }
        let object = self.scanner.try_read_token::<PDFObject>()?;
        self.locations.cache(
            Arc::new(IndirectObject {
                id: *id,
                offset,
                object: object.clone(),
            }),
            false,
        );
        Some(object)
    }

    fn unsigned(&mut self, key: &str) -> Option<u64> {
        to_u64(&self.get(key)?)
    }

    fn hint_streams(&mut self) -> Option<Vec<(u64, u64)>> {
        let array = self.get("H")?;
        let items = array.as_array().ok()?;
        if items.len() != 2 && items.len() != 4 {
            return None;
        }
        let mut numbers = Vec::with_capacity(items.len());
        for item in items {
            numbers.push(to_u64(&self.resolve(item)?)?);
        }
        Some(numbers.chunks_exact(2).map(|p| (p[0], p[1])).collect())
    }
}

fn to_u64(value: &PDFObject) -> Option<u64> {
    match value {
        PDFObject::Int(n) => u64::try_from(*n).ok(),
        PDFObject::Real(n) if *n >= 0.0 => Some(*n as u64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::TableSupplier;
    use crate::parser::PdfScanner;
    use bytes::Bytes;

    fn provider() -> ObjectLocationProvider {
        let supplier: TableSupplier = Box::new(|| None);
        ObjectLocationProvider::new(supplier, None)
    }

    #[test]
    fn reads_complete_dictionary() {
        let data = b"%PDF-1.5\n%\xe2\xe3\xcf\xd3\n43 0 obj\n<< /Linearized 1 /L 7000 /H [ 600 120 ] /O 45 /E 5000 /N 3 /T 6800 /P 1 >>\nendobj\n";
        let mut scanner = PdfScanner::from_slice(data);
        let params = LinearizationParameters::read(&mut scanner, &provider()).unwrap();
        assert_eq!(params.id, ObjectId::new(43, 0));
        assert_eq!(params.file_length, 7000);
        assert_eq!(params.hint_streams, vec![(600, 120)]);
        assert_eq!(params.first_page_objid, 45);
        assert_eq!(params.page_count, 3);
        assert_eq!(params.first_page_index, 1);
        assert!(params.matches_length(7000));
        assert!(!params.matches_length(7001));
    }

    #[test]
    fn missing_required_key_is_absent() {
        let data = b"%PDF-1.5\n1 0 obj << /Linearized 1 /L 700 /H [1 2] /O 3 /E 4 /T 5 >> endobj";
        let mut scanner = PdfScanner::new(Bytes::from_static(data));
        scanner.seek(17);
        assert!(LinearizationParameters::read(&mut scanner, &provider()).is_none());
        assert_eq!(scanner.current_position(), 17);
    }

    #[test]
    fn ordinary_first_object_is_absent() {
        let data = b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj";
        let mut scanner = PdfScanner::from_slice(data);
        assert!(LinearizationParameters::read(&mut scanner, &provider()).is_none());
    }

    #[test]
    fn indirect_values_are_resolved_through_provider() {
        let data = b"%PDF-1.5\n1 0 obj << /Linearized 1 /L 9 0 R /H [1 2] /O 3 /E 4 /N 5 /T 6 >> endobj\n9 0 obj 1234 endobj";
        let locations = provider();
        locations.update_offset(ObjectId::new(9, 0), 82);
        let mut scanner = PdfScanner::from_slice(data);
        let params = LinearizationParameters::read(&mut scanner, &locations).unwrap();
        assert_eq!(params.file_length, 1234);
        assert!(locations.try_get_cached(ObjectId::new(9, 0)).is_some());
    }
}
