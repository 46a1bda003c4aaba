//! Random-access byte source.
//!
//! The cursor model: `seek(p)` makes the next `move_next` yield the byte at
//! `p`; after `move_next` the yielded byte is `current_byte` and
//! `current_offset` points one past it.

use bytes::Bytes;
use std::ops::{Deref, DerefMut};

/// Seekable, peekable byte source consumed by the recovery scans.
pub trait InputBytes {
    /// Offset of the next byte `move_next` would yield.
    fn current_offset(&self) -> u64;

    /// Advance one byte. Returns false once the end has been reached.
    fn move_next(&mut self) -> bool;

    /// The byte most recently yielded by `move_next` (0 before the first).
    fn current_byte(&self) -> u8;

    /// The next byte without advancing.
    fn peek(&self) -> Option<u8>;

    /// Position the cursor; offsets past the end clamp to the end.
    fn seek(&mut self, offset: u64);

    /// Read into `buffer` from the cursor, advancing past what was read.
    fn read(&mut self, buffer: &mut [u8]) -> usize;

    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when no byte remains after the cursor.
    fn is_at_end(&self) -> bool {
        self.current_offset() >= self.len()
    }
}

/// In-memory byte source over shared `Bytes`.
#[derive(Debug, Clone)]
pub struct MemoryInputBytes {
    data: Bytes,
    pos: usize,
    current: u8,
}

impl MemoryInputBytes {
    pub const fn new(data: Bytes) -> Self {
        Self {
            data,
            pos: 0,
            current: 0,
        }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// The underlying bytes.
    pub const fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl InputBytes for MemoryInputBytes {
    fn current_offset(&self) -> u64 {
        self.pos as u64
    }

    fn move_next(&mut self) -> bool {
        match self.data.get(self.pos) {
            Some(&b) => {
                self.current = b;
                self.pos += 1;
                true
            }
            None => false,
        }
    }

    fn current_byte(&self) -> u8 {
        self.current
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn seek(&mut self, offset: u64) {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        self.pos = offset.min(self.data.len());
        self.current = if self.pos == 0 {
            0
        } else {
            self.data[self.pos - 1]
        };
    }

    fn read(&mut self, buffer: &mut [u8]) -> usize {
        let available = &self.data[self.pos..];
        let n = available.len().min(buffer.len());
        buffer[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        if n > 0 {
            self.current = buffer[n - 1];
        }
        n
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Scoped seek/restore: the cursor returns to where it was when dropped.
pub struct RestorePosition<'a, I: InputBytes + ?Sized> {
    input: &'a mut I,
    offset: u64,
}

impl<'a, I: InputBytes + ?Sized> RestorePosition<'a, I> {
    pub fn new(input: &'a mut I) -> Self {
        let offset = input.current_offset();
        Self { input, offset }
    }
}

impl<I: InputBytes + ?Sized> Deref for RestorePosition<'_, I> {
    type Target = I;

    fn deref(&self) -> &I {
        self.input
    }
}

impl<I: InputBytes + ?Sized> DerefMut for RestorePosition<'_, I> {
    fn deref_mut(&mut self) -> &mut I {
        self.input
    }
}

impl<I: InputBytes + ?Sized> Drop for RestorePosition<'_, I> {
    fn drop(&mut self) {
        self.input.seek(self.offset);
    }
}

/// Byte at `offset`, leaving the cursor just past it.
pub fn byte_at<I: InputBytes + ?Sized>(input: &mut I, offset: u64) -> Option<u8> {
    input.seek(offset);
    input.move_next().then(|| input.current_byte())
}

/// Whether `needle` occurs at exactly `offset`.
pub fn is_string_at<I: InputBytes + ?Sized>(input: &mut I, offset: u64, needle: &[u8]) -> bool {
    if offset.saturating_add(needle.len() as u64) > input.len() {
        return false;
    }
    input.seek(offset);
    needle.iter().all(|&expected| input.move_next() && input.current_byte() == expected)
}

/// PDF whitespace (ISO 32000 Table 1).
pub const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}
