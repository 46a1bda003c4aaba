//! Parser for classic `xref` ... `trailer << >>` sections.

use super::part::{CrossReferenceTablePart, CrossReferenceType, XrefPartBuilder};
use crate::error::{PdfError, Result};
use crate::model::objects::Dictionary;
use crate::parser::{Keyword, TokenScanner};
use tracing::warn;

/// Parse the table starting at `location`.
///
/// The part records `declared` as its own offset; the resolver fixes it up
/// when the two differ. In lenient mode a malformed entry ends its
/// subsection and a missing trailer leaves the dictionary empty.
pub fn parse_table<S: TokenScanner>(
    scanner: &mut S,
    declared: u64,
    location: u64,
    lenient: bool,
) -> Result<CrossReferenceTablePart> {
    scanner.seek(location);
    if scanner.try_read_token::<Keyword>() != Some(Keyword::Xref) {
        return Err(PdfError::XRefError {
            offset: location,
            msg: "expected 'xref' keyword".into(),
        });
    }

    let mut builder = XrefPartBuilder::new(CrossReferenceType::Table, declared);

    while let Some(first) = scanner.try_read_token::<i64>() {
        let Some(count) = scanner.try_read_token::<i64>() else {
            if lenient {
                warn!(
                    offset = scanner.current_position(),
                    first, "xref subsection has no entry count"
                );
                break;
            }
            return Err(PdfError::XRefError {
                offset: scanner.current_position(),
                msg: format!("subsection {first} has no entry count"),
            });
        };
        read_subsection(scanner, &mut builder, first, count, lenient)?;
    }

    if scanner.try_read_token::<Keyword>() == Some(Keyword::Trailer)
        && let Some(trailer) = scanner.try_read_token::<Dictionary>()
    {
        let previous = int_key(&trailer, "Prev");
        let tied = int_key(&trailer, "XRefStm");
        builder
            .set_previous(previous)
            .set_tied_to(tied)
            .set_dictionary(trailer);
    } else if lenient {
        warn!(offset = location, "xref table has no trailer dictionary");
    } else {
        return Err(PdfError::XRefError {
            offset: scanner.current_position(),
            msg: "expected trailer dictionary".into(),
        });
    }

    Ok(builder.build())
}

fn read_subsection<S: TokenScanner>(
    scanner: &mut S,
    builder: &mut XrefPartBuilder,
    first: i64,
    count: i64,
    lenient: bool,
) -> Result<()> {
    let mut base = first;
    for i in 0..count.max(0) {
        let entry_start = scanner.current_position();
        let entry = (
            scanner.try_read_token::<i64>(),
            scanner.try_read_token::<i64>(),
            scanner.try_read_token::<Keyword>(),
        );
        let (offset, genno, in_use) = match entry {
            (Some(offset), Some(genno), Some(Keyword::InUse)) => (offset, genno, true),
            (Some(offset), Some(genno), Some(Keyword::Free)) => (offset, genno, false),
            _ => {
                if lenient {
                    warn!(
                        offset = entry_start,
                        expected = count,
                        read = i,
                        "truncated xref subsection"
                    );
                    scanner.seek(entry_start);
                    return Ok(());
                }
                return Err(PdfError::XRefError {
                    offset: entry_start,
                    msg: format!("bad entry {i} of subsection starting at {first}"),
                });
            }
        };

        // Subsections declared as starting at 1 that still carry the
        // `0000000000 65535 f` head entry.
        if i == 0 && base > 0 && !in_use && offset == 0 && genno == 65535 {
            base -= 1;
        }

        let Some(number) = base.checked_add(i) else {
            if lenient {
                warn!(
                    offset = entry_start,
                    first, "xref subsection runs past the largest object number"
                );
                return Ok(());
            }
            return Err(PdfError::XRefError {
                offset: entry_start,
                msg: format!("object number overflows in subsection starting at {first}"),
            });
        };

        if in_use
            && let (Ok(objid), Ok(genno), Ok(offset)) = (
                u32::try_from(number),
                u32::try_from(genno),
                u64::try_from(offset),
            )
        {
            builder.add(objid, genno, offset);
        }
    }
    Ok(())
}

pub(crate) fn int_key(dict: &Dictionary, key: &str) -> Option<u64> {
    dict.get(key)
        .and_then(|v| v.as_int().ok())
        .and_then(|v| u64::try_from(v).ok())
}
