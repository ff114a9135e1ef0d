//! Layer 3b — labels and pending fixups.
//!
//! A label can be referenced before it's defined, so every jump/call
//! emitted against an as-yet-unplaced target records a `(fixup_offset,
//! label_name)` pair instead of a real displacement. A final resolution
//! pass walks every pending fixup and patches in `target - fixup_offset -
//! 4`, the classic single-pass backpatching scheme.
use std::collections::HashMap;

use log::warn;

use crate::buffer::CodeBuffer;

pub const MAX_LABELS: usize = 8192;
pub const MAX_FIXUPS: usize = 8192;

pub struct FixupTable {
    labels: HashMap<String, usize>,
    pending: Vec<(usize, String)>,
}

impl FixupTable {
    pub fn new() -> Self {
        FixupTable {
            labels: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Record that `name` now refers to the given code offset. A
    /// conditional/loop label is always placed exactly once by
    /// construction; a function label may collide with an earlier
    /// duplicate function's label, in which case the first placement wins
    /// and later ones are ignored — every call site resolves to whichever
    /// body was declared first, matching how duplicate function names are
    /// otherwise handled everywhere else in the front end.
    pub fn place_label(&mut self, name: &str, offset: usize) {
        if self.labels.contains_key(name) {
            return;
        }
        if self.labels.len() >= MAX_LABELS {
            warn!("label table full, discarding label '{name}'");
            return;
        }
        self.labels.insert(name.to_string(), offset);
    }

    /// Register a pending fixup: the four bytes at `fixup_offset` (already
    /// zero, written by the caller via `Isa::{jmp,call,test_and_jz}`) must
    /// later hold the signed displacement to `label`.
    pub fn add_pending(&mut self, fixup_offset: usize, label: &str) {
        if self.pending.len() >= MAX_FIXUPS {
            warn!("fixup table full, discarding reference to '{label}'");
            return;
        }
        self.pending.push((fixup_offset, label.to_string()));
    }

    /// Patch every pending fixup in the buffer. A fixup whose label was
    /// never defined is left as the zero bytes it was created with, which
    /// decodes as a jump to itself plus four bytes — harmless but inert.
    pub fn resolve(&self, buf: &mut CodeBuffer) {
        for (fixup_offset, label) in &self.pending {
            match self.labels.get(label) {
                Some(&target) => {
                    let disp = target as i64 - (*fixup_offset as i64 + 4);
                    buf.patch_i32(*fixup_offset, disp as i32);
                }
                None => {
                    warn!("unresolved fixup referencing undefined label '{label}'");
                }
            }
        }
    }

    pub fn label_offset(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for FixupTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_forward_reference() {
        let mut buf = CodeBuffer::with_capacity(64, "test");
        let mut table = FixupTable::new();

        buf.emit_byte(0xE9); // jmp rel32
        let fixup_at = buf.cursor();
        buf.emit_i32(0);
        table.add_pending(fixup_at, "end");

        buf.emit_bytes(&[0x90, 0x90, 0x90]); // filler
        let target = buf.cursor();
        table.place_label("end", target);

        table.resolve(&mut buf);

        let patched = i32::from_le_bytes(buf.as_slice()[fixup_at..fixup_at + 4].try_into().unwrap());
        assert_eq!(patched, target as i32 - (fixup_at as i32 + 4));
    }

    #[test]
    fn resolves_backward_reference() {
        let mut buf = CodeBuffer::with_capacity(64, "test");
        let mut table = FixupTable::new();

        let start = buf.cursor();
        table.place_label("loop_start", start);
        buf.emit_bytes(&[0x90, 0x90]); // filler body

        buf.emit_byte(0xE9); // jmp rel32 back to start
        let fixup_at = buf.cursor();
        buf.emit_i32(0);
        table.add_pending(fixup_at, "loop_start");

        table.resolve(&mut buf);
        let patched = i32::from_le_bytes(buf.as_slice()[fixup_at..fixup_at + 4].try_into().unwrap());
        assert_eq!(patched, start as i32 - (fixup_at as i32 + 4));
        assert!(patched < 0);
    }

    #[test]
    fn unresolved_label_stays_zero() {
        let mut buf = CodeBuffer::with_capacity(64, "test");
        let mut table = FixupTable::new();
        buf.emit_byte(0xE9);
        let fixup_at = buf.cursor();
        buf.emit_i32(0);
        table.add_pending(fixup_at, "never_defined");
        table.resolve(&mut buf);
        assert_eq!(&buf.as_slice()[fixup_at..fixup_at + 4], &[0, 0, 0, 0]);
    }
}
