//! pdfloc - locates and repairs the indirect objects of a PDF file.
//!
//! Builds the index from object identifier to byte offset out of the file's
//! cross-reference tables and streams, following incremental updates, and
//! recovers it by scanning when the declared structure is wrong or missing.

pub mod codec;
pub mod document;
pub mod error;
pub mod io;
pub mod locate;
pub mod model;
pub mod options;
pub mod parser;
pub mod xref;

pub use document::{LinearizationParameters, PdfIndex};
pub use error::{PdfError, Result};
pub use locate::{ObjectLocationProvider, TableSupplier};
pub use model::objects::{IndirectObject, ObjectId, PDFObject};
pub use options::ParsingOptions;
pub use xref::{CrossReferenceTable, load_cross_reference_table};
