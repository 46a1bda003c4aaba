//! Reads one `N G obj ... endobj` definition at a known offset.

use super::lexer::Keyword;
use super::scanner::{Token, TokenScanner};
use crate::error::{PdfError, Result};
use crate::io::{InputBytes, RestorePosition, is_whitespace};
use crate::model::objects::{IndirectObject, ObjectId, PDFObject, PDFStream};
use bytes::Bytes;

const ENDSTREAM: &[u8] = b"endstream";
const SEARCH_CHUNK: usize = 4096;

/// Read the object header `N G obj` at `offset`.
pub fn read_object_header<S: TokenScanner>(scanner: &mut S, offset: u64) -> Result<ObjectId> {
    scanner.seek(offset);
    let objid = scanner.try_read_token::<i64>();
    let genno = scanner.try_read_token::<i64>();
    let (Some(objid), Some(genno)) = (objid, genno) else {
        return Err(PdfError::SyntaxError(format!(
            "expected object header at offset {offset}"
        )));
    };
    if scanner.try_read_token::<Keyword>() != Some(Keyword::Obj) {
        return Err(PdfError::SyntaxError(format!(
            "expected 'obj' keyword at offset {offset}"
        )));
    }
    match (u32::try_from(objid), u32::try_from(genno)) {
        (Ok(objid), Ok(genno)) => Ok(ObjectId::new(objid, genno)),
        _ => Err(PdfError::SyntaxError(format!(
            "invalid object number {objid} {genno} at offset {offset}"
        ))),
    }
}

/// Read a complete indirect object, including a stream body if present.
///
/// The stream's `/Length` is trusted only when it is a direct integer that
/// lands on `endstream`; otherwise the body ends at the next `endstream`.
pub fn read_indirect_object<I, S>(
    input: &mut I,
    scanner: &mut S,
    offset: u64,
) -> Result<IndirectObject>
where
    I: InputBytes + ?Sized,
    S: TokenScanner,
{
    let id = read_object_header(scanner, offset)?;

    if !scanner.move_next()? {
        return Err(PdfError::UnexpectedEof);
    }
    let object = match scanner.current_token() {
        Some(Token::Object(obj)) => obj.clone(),
        Some(Token::Keyword(Keyword::Null)) => PDFObject::Null,
        Some(Token::Keyword(Keyword::EndObj)) => {
            return Ok(IndirectObject {
                id,
                offset,
                object: PDFObject::Null,
            });
        }
        Some(Token::Keyword(kw)) => {
            return Err(PdfError::TokenError {
                pos: scanner.current_token_start() as usize,
                msg: format!("unexpected keyword in object body: {kw}"),
            });
        }
        None => return Err(PdfError::UnexpectedEof),
    };

    let after_value = scanner.current_position();
    let object = match object {
        PDFObject::Dict(dict) if scanner.try_read_token::<Keyword>() == Some(Keyword::Stream) => {
            let data_start = stream_data_start(input, scanner.current_position());
            let declared = dict.get("Length").and_then(|len| len.as_int().ok());
            let (data, resume) = read_stream_body(input, data_start, declared)?;
            scanner.seek(resume);
            PDFObject::Stream(Box::new(PDFStream::new(dict, data)))
        }
        other => {
            scanner.seek(after_value);
            other
        }
    };

    // endobj is optional; files truncated right after endstream are common
    let _ = scanner.try_read_token::<Keyword>();

    Ok(IndirectObject { id, offset, object })
}

/// Skip the end-of-line after the `stream` keyword.
fn stream_data_start<I: InputBytes + ?Sized>(input: &mut I, after_keyword: u64) -> u64 {
    let mut input = RestorePosition::new(input);
    input.seek(after_keyword);
    let mut pos = after_keyword;
    // tolerate stray spaces before the EOL
    while input.peek() == Some(b' ') {
        input.move_next();
        pos += 1;
    }
    match input.peek() {
        Some(b'\r') => {
            input.move_next();
            pos += 1;
            if input.peek() == Some(b'\n') {
                pos += 1;
            }
        }
        Some(b'\n') => pos += 1,
        _ => {}
    }
    pos
}

/// Returns the body and the offset just past `endstream`.
fn read_stream_body<I: InputBytes + ?Sized>(
    input: &mut I,
    data_start: u64,
    declared_length: Option<i64>,
) -> Result<(Bytes, u64)> {
    let mut input = RestorePosition::new(input);

    if let Some(length) = declared_length.and_then(|len| u64::try_from(len).ok()) {
        let end = data_start.saturating_add(length);
        if end <= input.len() {
            let mut cursor = end;
            input.seek(end);
            while let Some(b) = input.peek() {
                if !is_whitespace(b) {
                    break;
                }
                input.move_next();
                cursor += 1;
            }
            if crate::io::is_string_at(&mut *input, cursor, ENDSTREAM) {
                let data = read_range(&mut *input, data_start, end);
                return Ok((data, cursor + ENDSTREAM.len() as u64));
            }
        }
    }

    let Some(keyword) = find_forward(&mut *input, data_start, ENDSTREAM) else {
        return Err(PdfError::SyntaxError(format!(
            "stream starting at {data_start} has no endstream"
        )));
    };
    // the EOL before endstream belongs to the keyword, not the data
    let mut end = keyword;
    if end > data_start && crate::io::byte_at(&mut *input, end - 1) == Some(b'\n') {
        end -= 1;
    }
    if end > data_start && crate::io::byte_at(&mut *input, end - 1) == Some(b'\r') {
        end -= 1;
    }
    let data = read_range(&mut *input, data_start, end);
    Ok((data, keyword + ENDSTREAM.len() as u64))
}

fn read_range<I: InputBytes + ?Sized>(input: &mut I, start: u64, end: u64) -> Bytes {
    let mut buf = vec![0u8; (end - start) as usize];
    input.seek(start);
    let n = input.read(&mut buf);
    buf.truncate(n);
    Bytes::from(buf)
}

/// First occurrence of `needle` at or after `from`.
pub(crate) fn find_forward<I: InputBytes + ?Sized>(
    input: &mut I,
    from: u64,
    needle: &[u8],
) -> Option<u64> {
    let mut chunk = vec![0u8; SEARCH_CHUNK + needle.len()];
    let mut base = from;
    loop {
        input.seek(base);
        let n = input.read(&mut chunk);
        if n < needle.len() {
            return None;
        }
        if let Some(i) = chunk[..n].windows(needle.len()).position(|w| w == needle) {
            return Some(base + i as u64);
        }
        if n < chunk.len() {
            return None;
        }
        base += (n - needle.len() + 1) as u64;
    }
}
