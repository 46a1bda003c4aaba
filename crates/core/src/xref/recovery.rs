//! Brute-force recovery of cross-reference offsets.
//!
//! When a declared offset cannot be trusted the raw bytes are scanned for
//! structural landmarks: `xref` keywords, `/XRef` stream objects and
//! `startxref` keywords. Each scan runs at most once per document and its
//! candidates are kept for later lookups.

use super::validator::{is_xref_stream_at, is_xref_table_at};
use crate::io::{CircularByteBuffer, InputBytes, RestorePosition, is_whitespace};
use crate::parser::TokenScanner;
use tracing::debug;

/// No xref section can start before the `%PDF-` header.
pub const MINIMUM_SEARCH_OFFSET: u64 = 6;

/// How far before a `/XRef` name the object header may start.
const STREAM_BACKSCAN: u64 = 400;
const STREAM_BACKSCAN_CHUNK: usize = 10;

const TABLE_MARKER: &[u8] = b" xref";
const STREAM_MARKER: &[u8] = b"/XRef";
const STARTXREF_MARKER: &[u8] = b" startxref";

/// Memoized landmark scans for one document.
#[derive(Debug, Default)]
pub struct XrefRecovery {
    tables: Option<Vec<u64>>,
    streams: Option<Vec<u64>>,
    startxrefs: Option<Vec<u64>>,
}

impl XrefRecovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offsets of every `xref` keyword preceded by whitespace.
    pub fn table_candidates<I: InputBytes + ?Sized>(&mut self, input: &mut I) -> &[u64] {
        self.tables
            .get_or_insert_with(|| scan_marker(input, TABLE_MARKER, 1))
    }

    /// Header offsets of every object that carries a `/XRef` name.
    pub fn stream_candidates<I: InputBytes + ?Sized>(&mut self, input: &mut I) -> &[u64] {
        self.streams.get_or_insert_with(|| scan_xref_streams(input))
    }

    /// Offsets of every `startxref` keyword preceded by whitespace.
    pub fn startxref_candidates<I: InputBytes + ?Sized>(&mut self, input: &mut I) -> &[u64] {
        self.startxrefs
            .get_or_insert_with(|| scan_marker(input, STARTXREF_MARKER, 1))
    }

    /// Find the section nearest to `declared`.
    ///
    /// A stream candidate beats a table candidate only when strictly nearer.
    /// The chosen candidate leaves its pool so a second bad offset cannot
    /// recover to it again. With no candidate at all the nearest `startxref`
    /// is followed, checking its target without scanning again.
    pub fn recover<I, S>(&mut self, declared: u64, input: &mut I, scanner: &mut S) -> Option<u64>
    where
        I: InputBytes + ?Sized,
        S: TokenScanner,
    {
        let table = nearest(self.table_candidates(input), declared);
        let stream = nearest(self.stream_candidates(input), declared);

        let pick_stream = match (table, stream) {
            (Some((_, table_dist)), Some((_, stream_dist))) => stream_dist < table_dist,
            (None, Some(_)) => true,
            (Some(_), None) => false,
            (None, None) => return self.follow_startxref(declared, input, scanner),
        };

        let (pool, index) = if pick_stream {
            (self.streams.as_mut(), stream.map(|(i, _)| i))
        } else {
            (self.tables.as_mut(), table.map(|(i, _)| i))
        };
        let (Some(pool), Some(index)) = (pool, index) else {
            return None;
        };
        let offset = pool.remove(index);
        debug!(
            declared,
            recovered = offset,
            stream = pick_stream,
            "recovered cross-reference offset"
        );
        Some(offset)
    }

    fn follow_startxref<I, S>(&mut self, declared: u64, input: &mut I, scanner: &mut S) -> Option<u64>
    where
        I: InputBytes + ?Sized,
        S: TokenScanner,
    {
        let (index, _) = nearest(self.startxref_candidates(input), declared)?;
        let keyword = self.startxrefs.as_ref()?[index];

        let restore = scanner.current_position();
        scanner.seek(keyword + b"startxref".len() as u64);
        let target = scanner.try_read_token::<i64>();
        scanner.seek(restore);

        let target = u64::try_from(target?).ok()?;
        if target >= input.len() {
            return None;
        }
        let valid = is_xref_table_at(input, target)
            || (target > 0 && is_xref_stream_at(scanner, target));
        debug!(startxref = keyword, target, valid, "followed startxref");
        valid.then_some(target)
    }
}

/// Index and distance of the candidate nearest `target`; the first found
/// wins ties.
pub fn nearest(candidates: &[u64], target: u64) -> Option<(usize, u64)> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, &c)| (i, c.abs_diff(target)))
        .min_by_key(|&(_, dist)| dist)
}

/// Linear scan with whitespace folded to `' '`. Records where `marker`
/// begins, shifted by `skip` (the leading whitespace byte).
fn scan_marker<I: InputBytes + ?Sized>(input: &mut I, marker: &[u8], skip: u64) -> Vec<u64> {
    let mut input = RestorePosition::new(input);
    let mut window = CircularByteBuffer::new(marker.len());
    let mut found = Vec::new();

    input.seek(MINIMUM_SEARCH_OFFSET);
    while input.move_next() {
        let b = input.current_byte();
        window.push(if is_whitespace(b) { b' ' } else { b });
        if window.ends_with(marker) {
            found.push(input.current_offset() - marker.len() as u64 + skip);
        }
    }
    found
}

/// Header offsets of objects containing a `/XRef` name (but not
/// `/XRefStm`).
fn scan_xref_streams<I: InputBytes + ?Sized>(input: &mut I) -> Vec<u64> {
    let mut input = RestorePosition::new(input);
    let mut window = CircularByteBuffer::new(STREAM_MARKER.len());
    let mut keywords = Vec::new();

    input.seek(MINIMUM_SEARCH_OFFSET);
    while input.move_next() {
        window.push(input.current_byte());
        if window.ends_with(STREAM_MARKER) && input.peek().is_none_or(ends_name) {
            keywords.push(input.current_offset() - STREAM_MARKER.len() as u64);
        }
    }

    let mut found: Vec<u64> = Vec::new();
    for keyword in keywords {
        if let Some(header) = find_object_header_before(&mut *input, keyword)
            && found.last() != Some(&header)
        {
            found.push(header);
        }
    }
    found
}

/// Whether `b` terminates a name token.
const fn ends_name(b: u8) -> bool {
    is_whitespace(b) || matches!(b, b'/' | b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'%')
}

/// Walk backward from `keyword` looking for `N G obj`, ten candidate
/// positions at a time, and return the offset of `N`.
fn find_object_header_before<I: InputBytes + ?Sized>(input: &mut I, keyword: u64) -> Option<u64> {
    let start = keyword.saturating_sub(STREAM_BACKSCAN);
    let mut buf = vec![0u8; (keyword - start) as usize];
    input.seek(start);
    let n = input.read(&mut buf);
    buf.truncate(n);

    let mut chunk_end = buf.len();
    while chunk_end > 0 {
        let chunk_start = chunk_end.saturating_sub(STREAM_BACKSCAN_CHUNK);
        for i in (chunk_start..chunk_end).rev() {
            if is_obj_marker(&buf[i..])
                && let Some(header) = header_start(&buf, i)
            {
                return Some(start + header as u64);
            }
        }
        chunk_end = chunk_start;
    }
    None
}

fn is_obj_marker(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && is_whitespace(bytes[0]) && &bytes[1..4] == b"obj"
}

/// Given the whitespace before `obj` at `marker`, step back over the
/// generation, one whitespace byte and the object number.
fn header_start(buf: &[u8], marker: usize) -> Option<usize> {
    let gen_end = marker;
    let mut i = gen_end;
    while i > 0 && buf[i - 1].is_ascii_digit() {
        i -= 1;
    }
    if i == gen_end || i == 0 || !is_whitespace(buf[i - 1]) {
        return None;
    }
    i -= 1;
    let num_end = i;
    while i > 0 && buf[i - 1].is_ascii_digit() {
        i -= 1;
    }
    (i < num_end).then_some(i)
}
