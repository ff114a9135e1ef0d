//! Layer 1 — the byte emitter.
//!
//! A fixed-capacity, growable-in-appearance-only byte sequence. Writes past
//! capacity are silently discarded rather than panicking or reallocating:
//! a freestanding compiler has no heap to fall back on if a pathological
//! input blows past a generous fixed allocation, so the buffer just stops
//! accepting bytes and the rest of the front end keeps advancing its cursor
//! by the nominal instruction length regardless of whether the bytes
//! actually landed.
use log::warn;

/// Default capacity for the code buffer: at least 4 MiB.
pub const DEFAULT_CODE_CAPACITY: usize = 4 * 1024 * 1024;
/// Default capacity for the data buffer: at least 1 MiB.
pub const DEFAULT_DATA_CAPACITY: usize = 1024 * 1024;

/// A contiguous byte buffer with a fixed capacity and a write cursor.
pub struct CodeBuffer {
    bytes: Vec<u8>,
    cursor: usize,
    capacity: usize,
    name: &'static str,
}

impl CodeBuffer {
    /// Allocate a buffer of exactly `capacity` bytes, zero-filled.
    pub fn with_capacity(capacity: usize, name: &'static str) -> Self {
        CodeBuffer {
            bytes: vec![0u8; capacity],
            cursor: 0,
            capacity,
            name,
        }
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The bytes written so far (`[0, cursor)`), regardless of capacity.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.cursor]
    }

    /// Move the cursor back to the given offset without touching capacity.
    /// Used by function emission bookkeeping; callers are expected to only
    /// rewind to offsets they previously observed via `cursor()`.
    pub fn set_cursor(&mut self, offset: usize) {
        debug_assert!(offset <= self.cursor);
        self.cursor = offset;
    }

    /// Overwrite four bytes at `offset` with a little-endian `i32`. Used
    /// exclusively by fixup resolution; `offset` must already be inside the
    /// written region.
    pub fn patch_i32(&mut self, offset: usize, value: i32) {
        if offset + 4 > self.cursor {
            warn!(
                "{}: patch_i32 at {offset} is outside the written region ({}), ignoring",
                self.name, self.cursor
            );
            return;
        }
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn has_room(&self, n: usize) -> bool {
        self.cursor + n <= self.capacity
    }

    pub fn emit_byte(&mut self, b: u8) {
        if !self.has_room(1) {
            warn!("{}: capacity exceeded, discarding byte", self.name);
            return;
        }
        self.bytes[self.cursor] = b;
        self.cursor += 1;
    }

    pub fn emit_bytes(&mut self, buf: &[u8]) {
        if !self.has_room(buf.len()) {
            warn!(
                "{}: capacity exceeded, discarding {} bytes",
                self.name,
                buf.len()
            );
            return;
        }
        self.bytes[self.cursor..self.cursor + buf.len()].copy_from_slice(buf);
        self.cursor += buf.len();
    }

    pub fn emit_u32(&mut self, v: u32) {
        self.emit_bytes(&v.to_le_bytes());
    }

    pub fn emit_u64(&mut self, v: u64) {
        self.emit_bytes(&v.to_le_bytes());
    }

    pub fn emit_i32(&mut self, v: i32) {
        self.emit_bytes(&v.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_little_endian() {
        let mut buf = CodeBuffer::with_capacity(64, "test");
        buf.emit_u32(0x04030201);
        assert_eq!(buf.as_slice(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn overflow_is_silently_discarded() {
        let mut buf = CodeBuffer::with_capacity(2, "test");
        buf.emit_u32(0xAABBCCDD);
        assert_eq!(buf.cursor(), 0);
        buf.emit_byte(0x11);
        buf.emit_byte(0x22);
        assert_eq!(buf.as_slice(), &[0x11, 0x22]);
        buf.emit_byte(0x33);
        assert_eq!(buf.as_slice(), &[0x11, 0x22]);
    }

    #[test]
    fn patch_i32_rewrites_in_place() {
        let mut buf = CodeBuffer::with_capacity(16, "test");
        let at = buf.cursor();
        buf.emit_i32(0);
        buf.emit_byte(0xFF);
        buf.patch_i32(at, -42);
        assert_eq!(i32::from_le_bytes(buf.as_slice()[at..at + 4].try_into().unwrap()), -42);
    }
}
