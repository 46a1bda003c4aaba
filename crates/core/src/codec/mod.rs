//! Stream decoding needed by the cross-reference layer.
//!
//! - `flate`: FlateDecode with PNG predictors

pub mod flate;

// Re-export main functions for convenience
pub use flate::{apply_png_predictor, decode_stream, inflate};
