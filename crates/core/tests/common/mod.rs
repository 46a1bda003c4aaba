//! Builds small PDF files in memory while recording exact byte offsets.

#![allow(dead_code)]

use std::collections::BTreeMap;

/// One row of an uncompressed xref stream with `/W [1 4 2]`.
#[derive(Debug, Clone, Copy)]
pub enum Row {
    Free,
    InFile { offset: u64, genno: u16 },
    Compressed { stream_objid: u32, index: u16 },
}

impl Row {
    pub fn encode(self) -> [u8; 7] {
        let (kind, field1, field2) = match self {
            Row::Free => (0u8, 0u32, 0u16),
            Row::InFile { offset, genno } => (1, offset as u32, genno),
            Row::Compressed {
                stream_objid,
                index,
            } => (2, stream_objid, index),
        };
        let mut out = [0u8; 7];
        out[0] = kind;
        out[1..5].copy_from_slice(&field1.to_be_bytes());
        out[5..7].copy_from_slice(&field2.to_be_bytes());
        out
    }
}

pub struct PdfBuilder {
    data: Vec<u8>,
    offsets: BTreeMap<u32, u64>,
}

impl PdfBuilder {
    pub fn new(version: &str) -> Self {
        let mut data = format!("%PDF-{version}\n").into_bytes();
        data.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");
        Self {
            data,
            offsets: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Append raw bytes, returning where they start.
    pub fn raw(&mut self, bytes: &[u8]) -> u64 {
        let at = self.len();
        self.data.extend_from_slice(bytes);
        at
    }

    /// Append `N G obj body endobj`, returning the header offset.
    pub fn object(&mut self, objid: u32, genno: u32, body: &str) -> u64 {
        let at = self.raw(format!("{objid} {genno} obj\n{body}\nendobj\n").as_bytes());
        self.offsets.insert(objid, at);
        at
    }

    /// Offset recorded for the latest definition of `objid`.
    pub fn offset_of(&self, objid: u32) -> u64 {
        self.offsets[&objid]
    }

    /// Append a classic table listing `entries` (generation 0), one
    /// subsection per entry after the free head. Returns the offset of
    /// `xref`.
    pub fn xref_table(&mut self, entries: &[(u32, u64)], trailer: &str) -> u64 {
        let mut text = String::from("xref\n0 1\n0000000000 65535 f \n");
        for (objid, offset) in entries {
            text.push_str(&format!("{objid} 1\n{offset:010} 00000 n \n"));
        }
        text.push_str(&format!("trailer\n{trailer}\n"));
        self.raw(text.as_bytes())
    }

    /// Append an xref stream object holding `rows` without a filter.
    /// `extra` is spliced into the stream dictionary.
    pub fn xref_stream(&mut self, objid: u32, rows: &[(u32, Row)], extra: &str) -> u64 {
        let mut body = Vec::new();
        let mut index = String::new();
        for (id, row) in rows {
            body.extend_from_slice(&row.encode());
            index.push_str(&format!("{id} 1 "));
        }
        let dict = format!(
            "<< /Type /XRef /W [1 4 2] /Index [{}] /Length {} {extra} >>",
            index.trim_end(),
            body.len()
        );
        self.stream_object(objid, &dict, &body)
    }

    /// Append `N 0 obj dict stream ... endstream endobj`.
    pub fn stream_object(&mut self, objid: u32, dict: &str, body: &[u8]) -> u64 {
        let at = self.raw(format!("{objid} 0 obj\n{dict}\nstream\n").as_bytes());
        self.data.extend_from_slice(body);
        self.data.extend_from_slice(b"\nendstream\nendobj\n");
        self.offsets.insert(objid, at);
        at
    }

    pub fn startxref(&mut self, offset: u64) {
        self.raw(format!("startxref\n{offset}\n%%EOF\n").as_bytes());
    }

    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}

/// A two-object document with a single classic table.
pub fn simple_pdf() -> (Vec<u8>, u64) {
    let mut pdf = PdfBuilder::new("1.4");
    let catalog = pdf.object(1, 0, "<< /Type /Catalog /Pages 2 0 R >>");
    let pages = pdf.object(2, 0, "<< /Type /Pages /Kids [] /Count 0 >>");
    let xref = pdf.xref_table(
        &[(1, catalog), (2, pages)],
        "<< /Size 3 /Root 1 0 R >>",
    );
    pdf.startxref(xref);
    (pdf.finish(), xref)
}
