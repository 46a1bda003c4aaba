//! PDF tokenizing and object reading.
//!
//! - `lexer`: primitive tokenizer
//! - `scanner`: seekable scanner assembling composite values
//! - `object_reader`: reads `N G obj ... endobj` at an offset

pub mod lexer;
pub mod object_reader;
pub mod scanner;

// Re-export main types for convenience
pub use lexer::{Keyword, LexToken, Lexer};
pub use object_reader::{read_indirect_object, read_object_header};
pub use scanner::{FromToken, PdfScanner, Token, TokenScanner};
