//! Error types for pdfloc.

use crate::model::objects::ObjectId;
use thiserror::Error;

/// Primary error type for object-location operations.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("invalid token at position {pos}: {msg}")]
    TokenError { pos: usize, msg: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("key not found: {0}")]
    KeyError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("PDF object {id} is stored in object stream {stream_objid}")]
    ObjectInStream { id: ObjectId, stream_objid: u32 },

    #[error("no valid xref table found")]
    NoValidXRef,

    #[error("PDF syntax error: {0}")]
    SyntaxError(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("invalid cross-reference data at offset {offset}: {msg}")]
    XRefError { offset: u64, msg: String },

    #[error("PDF format error: {0}")]
    FormatError(String),
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
