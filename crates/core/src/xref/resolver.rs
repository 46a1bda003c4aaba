//! Walks the `Prev` chain from the trailer and merges every section.

use super::part::{CrossReferenceTablePart, CrossReferenceType};
use super::stream_parser::parse_stream;
use super::table::{CrossReferenceTable, Generation};
use super::table_parser::parse_table;
use super::validator::{XrefOffsetValidator, is_xref_table_at};
use crate::error::{PdfError, Result};
use crate::io::InputBytes;
use crate::parser::TokenScanner;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Builds the merged cross-reference table of one document.
#[derive(Debug)]
pub struct CrossReferenceParser {
    lenient: bool,
    validator: XrefOffsetValidator,
}

impl CrossReferenceParser {
    pub fn new(lenient: bool) -> Self {
        Self {
            lenient,
            validator: XrefOffsetValidator::new(),
        }
    }

    /// Validate `declared`, then walk and merge the chain it starts.
    ///
    /// The first section must parse. A later section that fails ends the
    /// walk in lenient mode and is an error in strict mode. A `Prev` that
    /// loops back to a visited section ends the walk in both modes.
    pub fn parse<I, S>(
        &mut self,
        input: &mut I,
        scanner: &mut S,
        declared: i64,
    ) -> Result<CrossReferenceTable>
    where
        I: InputBytes + ?Sized,
        S: TokenScanner,
    {
        let start = self
            .validator
            .validate(declared, input, scanner, self.lenient)?;
        if start == 0 && self.lenient {
            warn!(declared, "no cross-reference data located");
            return Ok(CrossReferenceTable::from_generations(&[]));
        }

        let mut visited = HashSet::new();
        let mut generations: Vec<Generation> = Vec::new();
        let mut pending = Some((u64::try_from(declared).unwrap_or(0), start));

        while let Some((declared, location)) = pending.take() {
            if !visited.insert(location) {
                debug!(offset = location, "xref chain revisits a section, stopping");
                break;
            }

            let primary = match self.parse_part(input, scanner, declared, location, None) {
                Ok(part) => part,
                Err(err) if generations.is_empty() => {
                    return Err(PdfError::FormatError(format!(
                        "cannot read cross-reference data at offset {location}: {err}"
                    )));
                }
                Err(err) if self.lenient => {
                    warn!(offset = location, error = %err, "truncating xref chain");
                    break;
                }
                Err(err) => return Err(err),
            };

            let mut generation = Generation::new(primary);
            if generation.primary.kind() == CrossReferenceType::Table
                && let Some(stream_at) = generation.primary.tied_to_offset()
            {
                generation.tied = self.parse_tied_stream(
                    input,
                    scanner,
                    location,
                    stream_at,
                    &mut visited,
                )?;
            }

            pending = match generation.primary.previous_offset() {
                Some(prev) => self.next_location(input, scanner, prev)?,
                None => None,
            };
            generations.push(generation);
        }

        debug!(
            generations = generations.len(),
            "merged cross-reference sections"
        );
        Ok(CrossReferenceTable::from_generations(&generations))
    }

    /// Parse the section at `location`, fixing up its own offset when it was
    /// found somewhere other than where it was declared.
    fn parse_part<I, S>(
        &mut self,
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
        let mut part = if is_xref_table_at(input, location) {
            parse_table(scanner, declared, location, self.lenient)?
        } else {
            parse_stream(input, scanner, declared, location, tied_to)?
        };
        if part.self_offset() != location {
            debug!(declared, actual = location, "fixing cross-reference offset");
            part.fix_offset(location);
        }
        Ok(part)
    }

    /// The xref stream a hybrid table points at with `XRefStm`.
    fn parse_tied_stream<I, S>(
        &mut self,
        input: &mut I,
        scanner: &mut S,
        table_at: u64,
        stream_at: u64,
        visited: &mut HashSet<u64>,
    ) -> Result<Option<CrossReferenceTablePart>>
    where
        I: InputBytes + ?Sized,
        S: TokenScanner,
    {
        if !visited.insert(stream_at) {
            return Ok(None);
        }
        match parse_stream(input, scanner, stream_at, stream_at, Some(table_at)) {
            Ok(part) => Ok(Some(part)),
            Err(err) if self.lenient => {
                warn!(offset = stream_at, error = %err, "ignoring unreadable XRefStm");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Validate a `Prev` pointer; `None` ends the walk.
    fn next_location<I, S>(
        &mut self,
        input: &mut I,
        scanner: &mut S,
        prev: u64,
    ) -> Result<Option<(u64, u64)>>
    where
        I: InputBytes + ?Sized,
        S: TokenScanner,
    {
        let declared = i64::try_from(prev).unwrap_or(i64::MAX);
        let location = self
            .validator
            .validate(declared, input, scanner, self.lenient)?;
        if location == 0 && self.lenient {
            debug!(prev, "previous section not found, stopping");
            return Ok(None);
        }
        Ok(Some((prev, location)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryInputBytes;
    use crate::model::objects::ObjectId;
    use crate::parser::PdfScanner;
    use bytes::Bytes;

    fn resolve(data: &[u8], declared: i64, lenient: bool) -> Result<CrossReferenceTable> {
        let bytes = Bytes::copy_from_slice(data);
        let mut input = MemoryInputBytes::new(bytes.clone());
        let mut scanner = PdfScanner::new(bytes);
        CrossReferenceParser::new(lenient).parse(&mut input, &mut scanner, declared)
    }

    #[test]
    fn single_table() {
        let data = b"%PDF-1.4\nxref\n0 2\n0000000000 65535 f \n0000000042 00000 n \ntrailer << /Size 2 >>\n";
        let table = resolve(data, 9, false).unwrap();
        assert_eq!(table.offset_of(&ObjectId::new(1, 0)), Some(42));
        assert_eq!(table.depth(), 1);
    }

    #[test]
    fn self_referencing_prev_terminates() {
        let data = b"%PDF-1.4\nxref\n0 1\n0000000000 65535 f \ntrailer << /Prev 9 >>\n";
        let table = resolve(data, 9, true).unwrap();
        assert_eq!(table.depth(), 1);
        let table = resolve(data, 9, false).unwrap();
        assert_eq!(table.depth(), 1);
    }

    #[test]
    fn unreadable_first_section_is_a_format_error() {
        let data = b"%PDF-1.4\nnothing to see here\n";
        assert!(matches!(
            resolve(data, 9, false),
            Err(PdfError::FormatError(_))
        ));
    }

    #[test]
    fn lenient_without_any_section_yields_empty_table() {
        let data = b"%PDF-1.4\nnothing to see here\n";
        let table = resolve(data, 9, true).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.depth(), 0);
    }
}
