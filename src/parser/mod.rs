//! Layer 4 — the recursive-descent parser and code generator.
//!
//! There is no separate tokenisation pass: keywords are re-scanned at each
//! statement boundary, and `Compiler` keeps that shape throughout — no
//! token stream, just a byte offset (`pos`) threaded through every scanning
//! helper, the same `Cursor` primitives `lexer.rs` exposes. `stmt.rs` and
//! `expr.rs` add `impl Compiler` blocks for the statement dispatcher and
//! the expression grammar respectively; this module owns the shared cursor
//! plumbing, the first-pass function scan, and the emission order that
//! ties prologue, top-level code, the safety exit, and function bodies
//! together.
mod expr;
mod stmt;

use log::{debug, info};

use crate::buffer::CodeBuffer;
use crate::elf;
use crate::fixup::FixupTable;
use crate::isa::Isa;
use crate::lexer::Cursor;
use crate::meta::Metadata;
use crate::symtab::SymbolTable;

/// `loop` nests at most this many levels deep before `break`/`->` targeting
/// starts only reaching the outermost 16.
pub(crate) const MAX_LOOP_DEPTH: usize = 16;

/// `<ident> { … }` forms that are parsed and skipped without emission.
/// `fate` is handled separately since it also has an `on`/`off` form with
/// no braces at all; `pool` is also handled separately since its name and
/// size ahead of the brace feed the tile-pool report; `platform` doubles
/// as the prefix of the purely-syntactic `platform.probe`, checked before
/// this list is consulted.
pub(crate) const BLOCK_SKIP_KEYWORDS: &[&str] = &[
    "task", "gpu", "perf", "reg", "sys", "compiler", "collapse", "lib", "env", "rule", "intent",
    "platform", "tile", "codegen", "graphics", "gui", "style", "layout", "event", "db", "core",
    "kernel", "linux", "macos", "windows", "driver", "observe", "field", "use",
];

/// Owns every layer below it and drives source text straight into machine
/// code. The code buffer, symbol tables, fixup table, and metadata records
/// all live on this one value; the parser borrows it mutably throughout
/// compilation and no reference to its internals escapes.
pub struct Compiler {
    src: Vec<u8>,
    pos: usize,
    pub(crate) code: CodeBuffer,
    pub(crate) symtab: SymbolTable,
    pub(crate) fixups: FixupTable,
    pub(crate) meta: Metadata,
    pub(crate) loop_stack: Vec<(String, String)>,
    cond_id: u64,
    loop_id: u64,
}

impl Compiler {
    pub fn new(src: Vec<u8>) -> Self {
        Compiler {
            src,
            pos: 0,
            code: CodeBuffer::with_capacity(crate::buffer::DEFAULT_CODE_CAPACITY, "code"),
            symtab: SymbolTable::new(),
            fixups: FixupTable::new(),
            meta: Metadata::default(),
            loop_stack: Vec::new(),
            cond_id: 0,
            loop_id: 0,
        }
    }

    /// Run the whole pipeline: first-pass function scan, program prologue,
    /// top-level statements, safety exit, function bodies, fixup
    /// resolution.
    pub fn compile(&mut self) {
        self.prescan_functions();
        self.symtab.clear_functions();
        self.pos = 0;
        info!("prescan complete: {} function(s) discovered", self.symtab.function_count());

        Isa::prologue(&mut self.code, 512);
        debug!("program prologue emitted, 512 bytes of scratch reserved");

        self.compile_top_level();
        info!("top-level statements emitted at offset {}", self.code.cursor());

        // Unconditional exit(0) as a safety terminator, in case the source
        // never reaches one of its own.
        Isa::mov_edi_imm32(&mut self.code, 0);
        Isa::mov_eax_imm32(&mut self.code, 60);
        Isa::syscall(&mut self.code);

        self.emit_functions();

        self.fixups.resolve(&mut self.code);
        info!("fixups resolved, final code size {} bytes", self.code.cursor());
    }

    // ---- output accessors, read by main.rs / report.rs ------------------

    pub fn code_bytes(&self) -> &[u8] {
        self.code.as_slice()
    }

    /// `8 * global_count`, read by `elf::write_executable` to size `p_memsz`.
    /// By the time `compile()` returns, every surviving entry in the
    /// variable table is a global — all locals/parameters were dropped at
    /// their function's `exit_function` checkpoint.
    pub fn global_bytes(&self) -> u64 {
        8 * self.symtab.variable_count() as u64
    }

    pub fn variable_count(&self) -> usize {
        self.symtab.variable_count()
    }

    pub fn function_count(&self) -> usize {
        self.symtab.function_count()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    // ---- first-pass function scan ---------------------------------------

    /// Scan the entire source once, registering every `fn name params… {
    /// … }` declaration. Not statement-aware — it just walks byte by byte,
    /// skipping string literals (so `"fn"` inside a string can't mistrigger
    /// it) until it meets the literal keyword `fn`.
    fn prescan_functions(&mut self) {
        self.pos = 0;
        loop {
            self.skip_trivia();
            if self.at_eof() {
                break;
            }
            if self.matches_keyword("fn") {
                self.consume_keyword("fn");
                self.parse_fn_declaration();
            } else if self.peek_byte() == Some(b'"') {
                self.scan_string();
            } else {
                self.pos += 1;
            }
        }
    }

    /// Parse `name params… { … }` after the `fn` keyword has already been
    /// consumed, registering the function and skipping its body without
    /// emitting anything. Shared verbatim between the first-pass scan and
    /// the main pass's own `fn` statement handler, so top-level `fn`
    /// statements re-register their functions in source order during the
    /// real pass exactly as the prescan already discovered them.
    pub(crate) fn parse_fn_declaration(&mut self) {
        self.skip_trivia();
        let name = self.scan_identifier().unwrap_or_default();
        let mut params = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek_byte() == Some(b'{') || self.at_eof() {
                break;
            }
            match self.scan_identifier() {
                Some(p) => params.push(p),
                None => break,
            }
        }
        let body_span = self.skip_balanced_braces().unwrap_or((self.pos, self.pos));
        debug!("fn {name}({}) body [{}, {})", params.join(", "), body_span.0, body_span.1);
        self.symtab.declare_function(&name, params, body_span);
    }

    fn compile_top_level(&mut self) {
        loop {
            self.skip_trivia();
            if self.at_eof() {
                break;
            }
            self.compile_statement();
        }
    }

    /// Place each registered function's label, re-parse its saved body
    /// span as statements inside a fresh 256-byte frame, then
    /// unconditionally close it — regardless of whether the body itself
    /// already emitted an explicit `return`/`->`. There is no dead-code
    /// elimination here; a body is emitted in full even if every path
    /// through it returns early.
    fn emit_functions(&mut self) {
        let functions = self.symtab.functions().to_vec();
        let total = functions.len();
        for (i, f) in functions.iter().enumerate() {
            if f.body_span.0 >= f.body_span.1 {
                debug!("function '{}' has an empty body, nothing to emit", f.name);
                continue;
            }

            let label_offset = self.code.cursor();
            self.fixups.place_label(&f.name, label_offset);
            Isa::prologue(&mut self.code, 256);
            let mark = self.symtab.enter_function(&f.params);

            let saved_pos = self.pos;
            self.pos = f.body_span.0;
            let body_end = f.body_span.1;
            while self.pos < body_end {
                self.skip_trivia();
                if self.pos >= body_end {
                    break;
                }
                self.compile_statement();
            }
            self.pos = saved_pos;

            Isa::epilogue(&mut self.code);
            self.symtab.exit_function(mark);
            self.symtab.functions_mut()[i].code_offset = Some(label_offset);
            info!("function '{}' emitted ({}/{})", f.name, i + 1, total);
        }
    }

    // ---- shared cursor plumbing, thin wrappers over lexer::Cursor -------

    fn at_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub(crate) fn peek_byte(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    pub(crate) fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    pub(crate) fn skip_trivia(&mut self) {
        let mut cur = Cursor::at(&self.src, self.pos);
        cur.skip_trivia();
        self.pos = cur.pos();
    }

    pub(crate) fn skip_to_eol(&mut self) {
        let mut cur = Cursor::at(&self.src, self.pos);
        while let Some(b) = cur.peek() {
            if b == b'\n' {
                break;
            }
            cur.advance();
        }
        self.pos = cur.pos();
    }

    pub(crate) fn matches_keyword(&self, word: &str) -> bool {
        Cursor::at(&self.src, self.pos).matches_keyword(word)
    }

    pub(crate) fn pos_for_diagnostics(&self) -> usize {
        self.pos
    }

    pub(crate) fn consume_keyword(&mut self, word: &str) {
        self.pos += word.len();
    }

    pub(crate) fn advance_one(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    /// Advance the cursor by a fixed byte count, used by `expr.rs` to
    /// consume an already-recognised operator token (`==`, `!=`, `<=`, …)
    /// whose length varies with the match.
    pub(crate) fn pos_advance(&mut self, n: usize) {
        self.pos += n;
    }

    pub(crate) fn pos_snapshot(&self) -> usize {
        self.pos
    }

    pub(crate) fn pos_restore(&mut self, saved: usize) {
        self.pos = saved;
    }

    pub(crate) fn scan_identifier(&mut self) -> Option<String> {
        let mut cur = Cursor::at(&self.src, self.pos);
        let out = cur.scan_identifier();
        self.pos = cur.pos();
        out
    }

    pub(crate) fn scan_number(&mut self) -> Option<i64> {
        let mut cur = Cursor::at(&self.src, self.pos);
        let out = cur.scan_number();
        self.pos = cur.pos();
        out
    }

    pub(crate) fn scan_float(&mut self) -> Option<f64> {
        let mut cur = Cursor::at(&self.src, self.pos);
        let out = cur.scan_float();
        self.pos = cur.pos();
        out
    }

    pub(crate) fn scan_string(&mut self) -> Option<Vec<u8>> {
        let mut cur = Cursor::at(&self.src, self.pos);
        let out = cur.scan_string();
        self.pos = cur.pos();
        out
    }

    pub(crate) fn skip_balanced_braces(&mut self) -> Option<(usize, usize)> {
        let mut cur = Cursor::at(&self.src, self.pos);
        let out = cur.skip_balanced_braces();
        self.pos = cur.pos();
        out
    }

    pub(crate) fn next_cond_id(&mut self) -> u64 {
        self.cond_id += 1;
        self.cond_id
    }

    pub(crate) fn next_loop_id(&mut self) -> u64 {
        self.loop_id += 1;
        self.loop_id
    }

    /// Jump over an inline byte span and return its absolute virtual
    /// address. Since the whole image loads at a fixed, known base
    /// (`0x400000`, no PIE/relocation), the address of any code-buffer
    /// offset is computable at compile time without an actual rip-relative
    /// `lea` — `base + entry_offset + offset` is stable once emitted.
    pub(crate) fn emit_inline_bytes(&mut self, bytes: &[u8]) -> u64 {
        self.code.emit_byte(0xE9); // jmp rel32
        self.code.emit_i32(bytes.len() as i32);
        let data_off = self.code.cursor();
        self.code.emit_bytes(bytes);
        elf::BASE_ADDRESS + elf::ENTRY_OFFSET + data_off as u64
    }

    /// `out "..."` / `emit "..."`: inline the literal bytes into the code
    /// buffer and emit a `write(1, addr, len)` syscall against them. Neither
    /// form appends a newline — callers write one themselves with `\n`
    /// inside the string if they want one.
    pub(crate) fn emit_inline_write(&mut self, bytes: &[u8]) {
        let len = bytes.len() as u32;
        let addr = self.emit_inline_bytes(bytes);
        Isa::mov_rax_imm64(&mut self.code, addr);
        Isa::mov_argreg_rax(&mut self.code, crate::isa::ArgReg::Rsi);
        Isa::mov_argreg_imm32(&mut self.code, crate::isa::ArgReg::Rdi, 1);
        Isa::mov_argreg_imm32(&mut self.code, crate::isa::ArgReg::Rdx, len);
        Isa::mov_eax_imm32(&mut self.code, 1);
        Isa::syscall(&mut self.code);
    }
}
