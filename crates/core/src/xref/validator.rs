//! Decides whether a declared cross-reference offset can be trusted.

use super::recovery::XrefRecovery;
use crate::error::{PdfError, Result};
use crate::io::{InputBytes, RestorePosition, is_string_at, is_whitespace};
use crate::model::objects::{Dictionary, PDFObject};
use crate::parser::{TokenScanner, read_object_header};
use tracing::{error, warn};

/// Whether the `xref` keyword starts at `offset`, allowing leading
/// whitespace. The cursor is restored.
pub(crate) fn is_xref_table_at<I: InputBytes + ?Sized>(input: &mut I, offset: u64) -> bool {
    let mut input = RestorePosition::new(input);
    let mut at = offset;
    input.seek(at);
    while let Some(b) = input.peek()
        && is_whitespace(b)
    {
        input.move_next();
        at += 1;
    }
    is_string_at(&mut *input, at, b"xref")
}

/// Whether `N G obj << ... /Type /XRef ... >>` starts at `offset`. The
/// scanner position is restored.
pub(crate) fn is_xref_stream_at<S: TokenScanner>(scanner: &mut S, offset: u64) -> bool {
    let restore = scanner.current_position();
    let found = read_object_header(scanner, offset).is_ok()
        && scanner
            .try_read_token::<Dictionary>()
            .is_some_and(|dict| dict.get("Type") == Some(&PDFObject::Name("XRef".into())));
    scanner.seek(restore);
    found
}

/// Validates declared offsets and repairs them in lenient mode.
///
/// Keeps the recovery scans of one document so repeated validation (the
/// trailer offset, then each `Prev`) reuses them.
#[derive(Debug, Default)]
pub struct XrefOffsetValidator {
    recovery: XrefRecovery,
}

impl XrefOffsetValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a trusted offset for `declared`.
    ///
    /// Strict mode returns the offset as is. Lenient mode accepts it when an
    /// xref table or xref stream starts there and otherwise substitutes the
    /// nearest recovered section. `Ok(0)` means no cross-reference data
    /// could be located.
    pub fn validate<I, S>(
        &mut self,
        declared: i64,
        input: &mut I,
        scanner: &mut S,
        lenient: bool,
    ) -> Result<u64>
    where
        I: InputBytes + ?Sized,
        S: TokenScanner,
    {
        if !lenient {
            return u64::try_from(declared).map_err(|_| {
                PdfError::FormatError(format!("negative cross-reference offset {declared}"))
            });
        }

        let Ok(offset) = u64::try_from(declared) else {
            error!(declared, "cross-reference offset is negative");
            return Ok(0);
        };

        if offset >= input.len() {
            return Ok(self.recover(offset, input, scanner));
        }
        if is_xref_table_at(input, offset) {
            return Ok(offset);
        }
        if offset > 0 {
            if is_xref_stream_at(scanner, offset) {
                return Ok(offset);
            }
            return Ok(self.recover(offset, input, scanner));
        }

        error!(declared, "no cross-reference data at offset 0");
        Ok(0)
    }

    fn recover<I, S>(&mut self, declared: u64, input: &mut I, scanner: &mut S) -> u64
    where
        I: InputBytes + ?Sized,
        S: TokenScanner,
    {
        match self.recovery.recover(declared, input, scanner) {
            Some(recovered) => {
                warn!(declared, recovered, "cross-reference offset repaired");
                recovered
            }
            None => {
                error!(declared, "no cross-reference data found by scanning");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryInputBytes;
    use crate::parser::PdfScanner;
    use bytes::Bytes;

    fn fixture(data: &'static [u8]) -> (MemoryInputBytes, PdfScanner) {
        let bytes = Bytes::from_static(data);
        (MemoryInputBytes::new(bytes.clone()), PdfScanner::new(bytes))
    }

    #[test]
    fn detects_table_keyword_after_whitespace() {
        let (mut input, _) = fixture(b"%PDF-1.4\n\r\nxref\n");
        assert!(is_xref_table_at(&mut input, 9));
        assert!(is_xref_table_at(&mut input, 11));
        assert!(!is_xref_table_at(&mut input, 12));
        assert_eq!(input.current_offset(), 0);
    }

    #[test]
    fn detects_xref_stream_header() {
        let (_, mut scanner) = fixture(b"%PDF-1.5\n7 0 obj << /Type /XRef /W [1 1 1] >>");
        assert!(is_xref_stream_at(&mut scanner, 9));
        assert!(!is_xref_stream_at(&mut scanner, 10));
        assert_eq!(scanner.current_position(), 0);
    }

    #[test]
    fn other_object_is_not_an_xref_stream() {
        let (_, mut scanner) = fixture(b"%PDF-1.5\n7 0 obj << /Type /Catalog >>");
        assert!(!is_xref_stream_at(&mut scanner, 9));
    }

    #[test]
    fn strict_mode_returns_offset_unchanged() {
        let (mut input, mut scanner) = fixture(b"%PDF-1.4\nxref\n");
        let mut validator = XrefOffsetValidator::new();
        assert_eq!(
            validator.validate(3, &mut input, &mut scanner, false).unwrap(),
            3
        );
        assert!(validator.validate(-1, &mut input, &mut scanner, false).is_err());
    }

    #[test]
    fn lenient_zero_without_table_is_absent() {
        let (mut input, mut scanner) = fixture(b"%PDF-1.4\nxref\n");
        let mut validator = XrefOffsetValidator::new();
        assert_eq!(validator.validate(0, &mut input, &mut scanner, true).unwrap(), 0);
        assert_eq!(validator.validate(-7, &mut input, &mut scanner, true).unwrap(), 0);
    }
}
