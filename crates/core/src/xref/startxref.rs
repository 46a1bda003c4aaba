//! Locates the `startxref` pointer near the end of the file.

use crate::error::{PdfError, Result};
use crate::io::{InputBytes, RestorePosition, is_whitespace};
use tracing::debug;

const STARTXREF: &[u8] = b"startxref";

/// Where conforming writers put `startxref`.
pub const STARTXREF_SEARCH_WINDOW: u64 = 1024;

/// Read the offset declared after the last `startxref`.
///
/// Only the last 1024 bytes are searched unless `lenient`, which widens the
/// search to the whole file. A missing keyword or number is
/// `PdfError::NoValidXRef` in strict mode and `Ok(None)` in lenient mode.
pub fn find_startxref<I: InputBytes + ?Sized>(input: &mut I, lenient: bool) -> Result<Option<i64>> {
    let mut input = RestorePosition::new(input);
    let len = input.len();

    let tail_start = len.saturating_sub(STARTXREF_SEARCH_WINDOW);
    let mut found = read_declared(&mut *input, tail_start, len);
    if found.is_none() && lenient && tail_start > 0 {
        debug!("startxref not in file tail, searching whole file");
        found = read_declared(&mut *input, 0, len);
    }

    match found {
        Some(offset) => Ok(Some(offset)),
        None if lenient => Ok(None),
        None => Err(PdfError::NoValidXRef),
    }
}

fn read_declared<I: InputBytes + ?Sized>(input: &mut I, start: u64, end: u64) -> Option<i64> {
    let mut buf = vec![0u8; (end - start) as usize];
    input.seek(start);
    let n = input.read(&mut buf);
    buf.truncate(n);

    let at = buf.windows(STARTXREF.len()).rposition(|w| w == STARTXREF)?;
    parse_integer(&buf[at + STARTXREF.len()..])
}

/// Optionally signed decimal after leading whitespace.
fn parse_integer(rest: &[u8]) -> Option<i64> {
    let mut pos = rest.iter().position(|&b| !is_whitespace(b))?;
    let negative = rest[pos] == b'-';
    if negative || rest[pos] == b'+' {
        pos += 1;
    }
    let digits = rest[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let value: i64 = std::str::from_utf8(&rest[pos..pos + digits]).ok()?.parse().ok()?;
    Some(if negative { -value } else { value })
}
