//! Byte-source abstraction used by the recovery scans.
//!
//! - `input` - the `InputBytes` trait, an in-memory implementation and the
//!   scoped seek/restore guard
//! - `circular` - sliding window used by the keyword scans

pub mod circular;
pub mod input;

pub use circular::CircularByteBuffer;
pub use input::{InputBytes, MemoryInputBytes, RestorePosition, byte_at, is_string_at, is_whitespace};
