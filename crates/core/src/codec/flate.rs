//! FlateDecode and PNG predictors, as needed by cross-reference streams.

use crate::error::{PdfError, Result};
use crate::model::objects::{Dictionary, PDFObject, PDFStream};
use std::io::Read;

/// Decode a stream body according to its `/Filter` and `/DecodeParms`.
///
/// Only FlateDecode (or no filter) is supported; xref streams use nothing
/// else in practice.
pub fn decode_stream(stream: &PDFStream) -> Result<Vec<u8>> {
    let filters = match stream.get("Filter") {
        None | Some(PDFObject::Null) => Vec::new(),
        Some(PDFObject::Name(name)) => vec![name.as_str()],
        Some(PDFObject::Array(arr)) => arr
            .iter()
            .map(|f| f.as_name())
            .collect::<Result<Vec<_>>>()?,
        Some(other) => {
            return Err(PdfError::DecodeError(format!(
                "unsupported /Filter value {other}"
            )));
        }
    };

    let mut output = stream.rawdata.to_vec();
    for filter in &filters {
        match *filter {
            "FlateDecode" | "Fl" => output = inflate(&output),
            other => {
                return Err(PdfError::DecodeError(format!(
                    "unsupported filter /{other}"
                )));
            }
        }
    }

    if let Some(parms) = decode_parms(stream.get("DecodeParms")) {
        let predictor = int_param(parms, "Predictor", 1);
        if predictor >= 10 {
            let columns = int_param(parms, "Columns", 1);
            let colors = int_param(parms, "Colors", 1);
            let bits = int_param(parms, "BitsPerComponent", 8);
            output = apply_png_predictor(&output, columns, colors, bits)?;
        } else if predictor != 1 {
            return Err(PdfError::DecodeError(format!(
                "unsupported predictor {predictor}"
            )));
        }
    }

    Ok(output)
}

fn decode_parms(parms: Option<&PDFObject>) -> Option<&Dictionary> {
    match parms? {
        PDFObject::Dict(d) => Some(d),
        PDFObject::Array(arr) => arr.iter().find_map(|p| p.as_dict().ok()),
        _ => None,
    }
}

fn int_param(parms: &Dictionary, key: &str, default: usize) -> usize {
    parms
        .get(key)
        .and_then(|v| v.as_int().ok())
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

/// Zlib decompression, keeping whatever was produced before a failure.
pub fn inflate(data: &[u8]) -> Vec<u8> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    if decoder.read_to_end(&mut out).is_ok() {
        return out;
    }
    inflate_corrupted(data)
}

/// Byte-at-a-time decompression that stops at the first error
/// (typically a bad checksum at the very end).
fn inflate_corrupted(data: &[u8]) -> Vec<u8> {
    use flate2::{Decompress, FlushDecompress, Status};
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0usize;
    while i < data.len() {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..i + 1], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        out.extend_from_slice(&buf[..produced]);
        let consumed = (decoder.total_in() - before_in) as usize;
        i += consumed.max(1);
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) => {}
        }
    }
    out
}

/// Reverse PNG row filters (one filter-type byte per row).
pub fn apply_png_predictor(
    data: &[u8],
    columns: usize,
    colors: usize,
    bits_per_component: usize,
) -> Result<Vec<u8>> {
    let row_bytes = colors
        .checked_mul(columns)
        .and_then(|n| n.checked_mul(bits_per_component))
        .map(|bits| bits.div_ceil(8))
        .ok_or_else(|| PdfError::DecodeError("predictor row width overflows".into()))?;
    if row_bytes == 0 {
        return Err(PdfError::DecodeError("predictor row width is zero".into()));
    }
    if row_bytes > data.len() {
        return Err(PdfError::DecodeError(format!(
            "predictor row width {row_bytes} exceeds {} bytes of data",
            data.len()
        )));
    }
    // columns >= 1 here, so this product cannot overflow
    let bpp = (colors * bits_per_component / 8).clamp(1, row_bytes);
    let row_size = row_bytes + 1;

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];
    let mut current_row = vec![0u8; row_bytes];

    for row in data.chunks_exact(row_size) {
        let filter_type = row[0];
        let row_data = &row[1..];
        for i in 0..row_bytes {
            let left = if i >= bpp { current_row[i - bpp] } else { 0 };
            let above = prev_row[i];
            let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
            let predicted = match filter_type {
                0 => 0,
                1 => left,
                2 => above,
                3 => ((u16::from(left) + u16::from(above)) / 2) as u8,
                4 => paeth_predictor(left, above, upper_left),
                other => {
                    return Err(PdfError::DecodeError(format!(
                        "invalid PNG filter type {other}"
                    )));
                }
            };
            current_row[i] = row_data[i].wrapping_add(predicted);
        }
        result.extend_from_slice(&current_row);
        std::mem::swap(&mut prev_row, &mut current_row);
    }

    Ok(result)
}

/// Paeth predictor function used in PNG filtering.
const fn paeth_predictor(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn png_up_predictor() {
        // two rows of width 3, filter Up on the second
        let data = [0, 1, 2, 3, 2, 1, 1, 1];
        let out = apply_png_predictor(&data, 3, 1, 8).unwrap();
        assert_eq!(out, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn png_sub_and_paeth() {
        let data = [1, 5, 1, 1, 4, 0, 0, 0];
        let out = apply_png_predictor(&data, 3, 1, 8).unwrap();
        assert_eq!(out, vec![5, 6, 7, 5, 6, 7]);
    }

    #[test]
    fn oversized_predictor_rows_are_rejected() {
        let data = [2, 0, 0, 10];
        assert!(matches!(
            apply_png_predictor(&data, 1 << 62, 4, 8),
            Err(PdfError::DecodeError(_))
        ));
        assert!(matches!(
            apply_png_predictor(&data, 1 << 40, 1, 8),
            Err(PdfError::DecodeError(_))
        ));
        assert!(matches!(
            apply_png_predictor(&data, 0, 1, 8),
            Err(PdfError::DecodeError(_))
        ));
    }

    #[test]
    fn flate_with_predictor_from_dictionary() {
        let raw = [2u8, 0, 0, 10, 2, 0, 0, 5];
        let mut parms = Dictionary::new();
        parms.insert("Predictor".into(), PDFObject::Int(12));
        parms.insert("Columns".into(), PDFObject::Int(3));
        let mut dict = Dictionary::new();
        dict.insert("Filter".into(), PDFObject::Name("FlateDecode".into()));
        dict.insert("DecodeParms".into(), PDFObject::Dict(parms));
        let stream = PDFStream::new(dict, Bytes::from(deflate(&raw)));
        assert_eq!(decode_stream(&stream).unwrap(), vec![0, 0, 10, 0, 0, 15]);
    }

    #[test]
    fn truncated_flate_keeps_partial_output() {
        let mut compressed = deflate(b"0123456789abcdef");
        compressed.truncate(compressed.len() - 4);
        let out = inflate(&compressed);
        assert!(b"0123456789abcdef".starts_with(&out));
    }

    #[test]
    fn unsupported_filter_is_an_error() {
        let mut dict = Dictionary::new();
        dict.insert("Filter".into(), PDFObject::Name("LZWDecode".into()));
        let stream = PDFStream::new(dict, Bytes::from_static(b""));
        assert!(matches!(
            decode_stream(&stream),
            Err(PdfError::DecodeError(_))
        ));
    }
}
