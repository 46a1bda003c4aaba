//! Document-level entry points.
//!
//! This module contains:
//! - `index` - opens a file and fetches objects by identifier (PdfIndex)
//! - `linearization` - the optional linearization parameter dictionary

pub mod index;
pub mod linearization;

// Re-export main types for convenience
pub use index::PdfIndex;
pub use linearization::{LINEARIZATION_WINDOW, LinearizationParameters};
