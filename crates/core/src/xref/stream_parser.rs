//! Parser for cross-reference streams (`/Type /XRef`, PDF 1.5+).

use super::part::{CrossReferenceTablePart, CrossReferenceType, XrefEntry, XrefPartBuilder};
use super::table_parser::int_key;
use crate::codec::decode_stream;
use crate::error::{PdfError, Result};
use crate::io::InputBytes;
use crate::model::objects::{ObjectId, PDFObject, PDFStream};
use crate::parser::{TokenScanner, read_indirect_object};
use tracing::debug;

/// Stream-only keys dropped when the dictionary doubles as a trailer.
const STREAM_KEYS: [&str; 5] = ["Length", "Filter", "DecodeParms", "W", "Index"];

/// Parse the xref stream object at `location`.
///
/// `tied_to` is the offset of the table that referenced this stream through
/// `XRefStm`, for hybrid files.
pub fn parse_stream<I, S>(
    input: &mut I,
    scanner: &mut S,
    declared: u64,
    location: u64,
    tied_to: Option<u64>,
) -> Result<CrossReferenceTablePart>
where
    I: InputBytes + ?Sized,
    S: TokenScanner,
{
    let object = read_indirect_object(input, scanner, location)?;
    let PDFObject::Stream(stream) = object.object else {
        return Err(PdfError::XRefError {
            offset: location,
            msg: format!("object {} is not a stream", object.id),
        });
    };
    if let Some(kind) = stream.get("Type")
        && kind.as_name().ok() != Some("XRef")
    {
        return Err(PdfError::XRefError {
            offset: location,
            msg: format!("stream type is {kind}, not /XRef"),
        });
    }

    let widths = field_widths(&stream, location)?;
    let subsections = subsections(&stream)?;
    let data = decode_stream(&stream)?;

    let mut builder = XrefPartBuilder::new(CrossReferenceType::Stream, declared);
    let entry_size: usize = widths.iter().sum();
    if entry_size == 0 {
        return Err(PdfError::XRefError {
            offset: location,
            msg: "/W describes empty entries".into(),
        });
    }
    let mut rows = data.chunks_exact(entry_size);

    'sections: for (first, count) in subsections {
        for i in 0..count {
            let Some(row) = rows.next() else {
                debug!(
                    offset = location,
                    "xref stream data ends before its index does"
                );
                break 'sections;
            };
            let (kind, rest) = row.split_at(widths[0]);
            let (field1, field2) = rest.split_at(widths[1]);
            // a zero-width type field defaults to type 1
            let kind = if widths[0] == 0 { 1 } else { read_be(kind) };
            let (field1, field2) = (read_be(field1), read_be(field2));

            let Ok(objid) = u32::try_from(u64::from(first) + i) else {
                continue;
            };
            match kind {
                1 => {
                    let genno = u32::try_from(field2).unwrap_or(0);
                    builder.add(objid, genno, field1);
                }
                2 => {
                    if let (Ok(stream_objid), Ok(index)) =
                        (u32::try_from(field1), u32::try_from(field2))
                    {
                        builder.add_entry(
                            ObjectId::new(objid, 0),
                            XrefEntry::Compressed {
                                stream_objid,
                                index,
                            },
                        );
                    }
                }
                // free, or reserved types that must be ignored
                _ => {}
            }
        }
    }

    let mut dictionary = stream.dict;
    for key in STREAM_KEYS {
        dictionary.shift_remove(key);
    }
    let previous = int_key(&dictionary, "Prev");
    builder
        .set_previous(previous)
        .set_tied_to(tied_to)
        .set_dictionary(dictionary);
    Ok(builder.build())
}

fn field_widths(stream: &PDFStream, location: u64) -> Result<[usize; 3]> {
    let w = stream.get("W").ok_or_else(|| PdfError::XRefError {
        offset: location,
        msg: "xref stream has no /W".into(),
    })?;
    let arr = w.as_array()?;
    if arr.len() != 3 {
        return Err(PdfError::XRefError {
            offset: location,
            msg: format!("/W must have 3 elements, found {}", arr.len()),
        });
    }
    let mut widths = [0usize; 3];
    for (slot, value) in widths.iter_mut().zip(arr) {
        *slot = usize::try_from(value.as_int()?).map_err(|_| PdfError::XRefError {
            offset: location,
            msg: "negative /W entry".into(),
        })?;
        if *slot > 8 {
            return Err(PdfError::XRefError {
                offset: location,
                msg: format!("/W field of {slot} bytes is too wide"),
            });
        }
    }
    Ok(widths)
}

/// `(first objid, count)` pairs from `/Index`, defaulting to `[0 Size]`.
fn subsections(stream: &PDFStream) -> Result<Vec<(u32, u64)>> {
    let Some(index) = stream.get("Index") else {
        let size = stream
            .get("Size")
            .ok_or_else(|| PdfError::KeyError("Size".into()))?
            .as_int()?;
        return Ok(vec![(0, u64::try_from(size).unwrap_or(0))]);
    };
    let arr = index.as_array()?;
    let mut pairs = Vec::with_capacity(arr.len() / 2);
    for pair in arr.chunks_exact(2) {
        let first = u32::try_from(pair[0].as_int()?).unwrap_or(0);
        let count = u64::try_from(pair[1].as_int()?).unwrap_or(0);
        pairs.push((first, count));
    }
    Ok(pairs)
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryInputBytes;
    use crate::parser::PdfScanner;
    use bytes::Bytes;

    fn parse(data: Vec<u8>, tied_to: Option<u64>) -> Result<CrossReferenceTablePart> {
        let bytes = Bytes::from(data);
        let mut input = MemoryInputBytes::new(bytes.clone());
        let mut scanner = PdfScanner::new(bytes);
        parse_stream(&mut input, &mut scanner, 0, 0, tied_to)
    }

    fn xref_stream(dict: &str, rows: &[u8]) -> Vec<u8> {
        let mut data = format!("9 0 obj\n<< {dict} /Length {} >>\nstream\n", rows.len()).into_bytes();
        data.extend_from_slice(rows);
        data.extend_from_slice(b"\nendstream\nendobj\n");
        data
    }

    #[test]
    fn reads_all_entry_types() {
        let rows = [0, 0, 0, 255, 1, 0, 15, 0, 2, 0, 9, 3];
        let data = xref_stream("/Type /XRef /Size 3 /W [1 2 1] /Root 1 0 R /Prev 7", &rows);
        let part = parse(data, Some(120)).unwrap();
        assert_eq!(part.len(), 2);
        assert_eq!(part.get(&ObjectId::new(1, 0)), Some(&XrefEntry::InFile(15)));
        assert_eq!(
            part.get(&ObjectId::new(2, 0)),
            Some(&XrefEntry::Compressed {
                stream_objid: 9,
                index: 3
            })
        );
        assert_eq!(part.previous_offset(), Some(7));
        assert_eq!(part.tied_to_offset(), Some(120));
        assert!(part.dictionary().get("W").is_none());
        assert!(part.dictionary().get("Root").is_some());
    }

    #[test]
    fn index_selects_object_numbers() {
        let rows = [1, 0, 40, 0, 1, 0, 80, 1];
        let data = xref_stream("/Type /XRef /Size 21 /Index [10 1 20 1] /W [1 2 1]", &rows);
        let part = parse(data, None).unwrap();
        assert_eq!(part.get(&ObjectId::new(10, 0)), Some(&XrefEntry::InFile(40)));
        assert_eq!(part.get(&ObjectId::new(20, 1)), Some(&XrefEntry::InFile(80)));
    }

    #[test]
    fn zero_width_type_defaults_to_in_file() {
        let rows = [0, 50, 0];
        let data = xref_stream("/Type /XRef /Size 1 /W [0 2 1]", &rows);
        let part = parse(data, None).unwrap();
        assert_eq!(part.get(&ObjectId::new(0, 0)), Some(&XrefEntry::InFile(50)));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let data = xref_stream("/Type /ObjStm /Size 1 /W [1 1 1]", &[1, 1, 0]);
        assert!(parse(data, None).is_err());
    }

    #[test]
    fn missing_widths_is_rejected() {
        let data = xref_stream("/Type /XRef /Size 1", &[1, 1, 0]);
        assert!(matches!(
            parse(data, None),
            Err(PdfError::XRefError { .. })
        ));
    }
}
