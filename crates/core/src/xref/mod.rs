//! Cross-reference data: parsing, validation, recovery and merging.
//!
//! - `part` - one parsed section and its builder
//! - `table` - the merged index and trailer accessors
//! - `table_parser` / `stream_parser` - classic tables and xref streams
//! - `validator` - trusts or repairs a declared offset
//! - `recovery` - brute-force landmark scans
//! - `resolver` - walks `Prev` links and merges sections
//! - `object_scan` - rebuilds an index from object headers
//! - `startxref` - finds the declared starting offset

pub mod object_scan;
pub mod part;
pub mod recovery;
pub mod resolver;
pub mod startxref;
pub mod stream_parser;
pub mod table;
pub mod table_parser;
pub mod validator;

pub use object_scan::{find_last_trailer, scan_for_objects, scan_object_headers};
pub use part::{CrossReferenceTablePart, CrossReferenceType, XrefEntry, XrefPartBuilder};
pub use recovery::{MINIMUM_SEARCH_OFFSET, XrefRecovery, nearest};
pub use resolver::CrossReferenceParser;
pub use startxref::find_startxref;
pub use table::{CrossReferenceOffset, CrossReferenceTable, Generation, TrailerDictionary};
pub use validator::XrefOffsetValidator;

use crate::error::Result;
use crate::io::InputBytes;
use crate::options::ParsingOptions;
use crate::parser::TokenScanner;

/// Build the merged cross-reference table starting at `declared`.
pub fn load_cross_reference_table<I, S>(
    input: &mut I,
    scanner: &mut S,
    declared: i64,
    options: &ParsingOptions,
) -> Result<CrossReferenceTable>
where
    I: InputBytes + ?Sized,
    S: TokenScanner,
{
    options.scoped(|| CrossReferenceParser::new(options.lenient).parse(input, scanner, declared))
}
