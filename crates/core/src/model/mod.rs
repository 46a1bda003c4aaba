//! PDF model types.
//!
//! - `objects` - PDF object types (PDFObject, PDFStream, ObjectId, IndirectObject)

pub mod objects;

// Re-export main types for convenience
pub use objects::{Dictionary, IndirectObject, ObjectId, PDFObject, PDFStream};
