//! The statement dispatcher.
//!
//! Statements are recognised by keyword prefix matching at the current
//! source cursor, longest-match handled implicitly by `Cursor::matches_keyword`'s
//! word-boundary check (so `whenever` never gets mistaken for `when`).
//! Anything that doesn't match a fixed keyword falls through to the generic
//! identifier path, which covers assignment, user function calls, the
//! purely-syntactic dotted forms, `syscall.*`, and the named `<ident> { … }`
//! block-skip declarations — all sharing one scanned identifier so their
//! dispatch can't drift out of sync with each other.
use log::{debug, warn};

use crate::isa::Isa;
use crate::meta::Metadata;

use super::{Compiler, BLOCK_SKIP_KEYWORDS, MAX_LOOP_DEPTH};

impl Compiler {
    pub(crate) fn compile_statement(&mut self) {
        self.skip_trivia();
        if self.peek_byte().is_none() {
            return;
        }

        if self.matches_keyword("out") {
            self.consume_keyword("out");
            self.skip_trivia();
            let bytes = self.scan_string().unwrap_or_default();
            self.emit_inline_write(&bytes);
        } else if self.matches_keyword("emit") {
            self.consume_keyword("emit");
            self.skip_trivia();
            let bytes = self.scan_string().unwrap_or_default();
            self.emit_inline_write(&bytes);
        } else if self.matches_keyword("fn") {
            self.consume_keyword("fn");
            self.parse_fn_declaration();
        } else if self.matches_keyword("when") {
            self.compile_when();
        } else if self.matches_keyword("otherwise") {
            self.consume_keyword("otherwise");
            self.skip_trivia();
            self.parse_block();
        } else if self.matches_keyword("loop") {
            self.compile_loop();
        } else if self.matches_keyword("break") {
            self.consume_keyword("break");
            self.compile_break();
        } else if self.matches_keyword("return") {
            self.consume_keyword("return");
            self.skip_trivia();
            self.compile_return();
        } else if self.peek_byte() == Some(b'-') && self.peek_byte_at(1) == Some(b'>') {
            self.consume_keyword("->");
            self.skip_trivia();
            self.compile_return();
        } else if self.matches_keyword("keep") {
            self.consume_keyword("keep");
            Isa::keep_spin(&mut self.code);
        } else if self.matches_keyword("fate") {
            self.compile_fate();
        } else if self.matches_keyword("pool") {
            self.compile_pool();
        } else if self.matches_keyword("limit") {
            self.consume_keyword("limit");
            self.skip_trivia();
            let n = self.scan_number().unwrap_or(0);
            self.meta.fate.set_limit(n);
        } else if self.matches_keyword("unified") {
            self.compile_unified();
        } else {
            self.compile_identifier_statement();
        }
    }

    /// `{ statement* }`, consuming both braces. Used by `when`/`otherwise`/
    /// `loop` bodies and by function bodies via `compile_statement`'s own
    /// looping in `emit_functions`.
    pub(crate) fn parse_block(&mut self) {
        self.skip_trivia();
        if self.peek_byte() != Some(b'{') {
            warn!("expected '{{' to start a block, found none — skipping to end of line");
            self.skip_to_eol();
            return;
        }
        self.consume_keyword("{");
        loop {
            self.skip_trivia();
            match self.peek_byte() {
                None => break,
                Some(b'}') => {
                    self.consume_keyword("}");
                    break;
                }
                _ => self.compile_statement(),
            }
        }
    }

    fn compile_when(&mut self) {
        self.consume_keyword("when");
        self.skip_trivia();
        self.compile_expr();
        self.skip_trivia();
        let fixup_at = Isa::test_and_jz(&mut self.code);
        let id = self.next_cond_id();
        let end_label = format!("_when_end_{id}");
        self.fixups.add_pending(fixup_at, &end_label);
        self.parse_block();
        let end_off = self.code.cursor();
        self.fixups.place_label(&end_label, end_off);
    }

    fn compile_loop(&mut self) {
        self.consume_keyword("loop");
        self.skip_trivia();
        let id = self.next_loop_id();
        let start_label = format!("_loop_start_{id}");
        let end_label = format!("_loop_end_{id}");

        let start_off = self.code.cursor();
        self.fixups.place_label(&start_label, start_off);

        if self.loop_stack.len() >= MAX_LOOP_DEPTH {
            warn!("loop nesting exceeds the documented {MAX_LOOP_DEPTH}-level limit");
        }
        self.loop_stack.push((start_label.clone(), end_label.clone()));

        self.parse_block();

        let back_fixup = Isa::jmp(&mut self.code);
        self.fixups.add_pending(back_fixup, &start_label);
        let end_off = self.code.cursor();
        self.fixups.place_label(&end_label, end_off);
        self.loop_stack.pop();
    }

    fn compile_break(&mut self) {
        match self.loop_stack.last().cloned() {
            Some((_, end_label)) => {
                let fixup_at = Isa::jmp(&mut self.code);
                self.fixups.add_pending(fixup_at, &end_label);
            }
            None => debug!("'break' outside any loop is a no-op"),
        }
    }

    /// Shared by both the `return <expr>` keyword and the `-> <expr>`
    /// symbol: compile the value, then either jump to the innermost loop's
    /// end-label (acting as "break with a value") or emit the function
    /// epilogue if no loop is active.
    fn compile_return(&mut self) {
        self.compile_expr();
        match self.loop_stack.last().cloned() {
            Some((_, end_label)) => {
                let fixup_at = Isa::jmp(&mut self.code);
                self.fixups.add_pending(fixup_at, &end_label);
            }
            None => Isa::epilogue(&mut self.code),
        }
    }

    fn compile_fate(&mut self) {
        self.consume_keyword("fate");
        self.skip_trivia();
        if self.matches_keyword("on") {
            self.consume_keyword("on");
            self.meta.fate.set_enabled(true);
        } else if self.matches_keyword("off") {
            self.consume_keyword("off");
            self.meta.fate.set_enabled(false);
        } else if self.peek_byte() == Some(b'{') {
            self.skip_balanced_braces();
        } else {
            warn!("unrecognised 'fate' form, skipping to end of line");
            self.skip_to_eol();
        }
    }

    /// `pool <name> <size> { … }` — records a named byte range in the
    /// tile-pool accounting table (purely for the final report) and then
    /// skips the block body without emitting anything, like every other
    /// `<ident> { … }` form.
    fn compile_pool(&mut self) {
        self.consume_keyword("pool");
        self.skip_trivia();
        let name = self.scan_identifier().unwrap_or_default();
        self.skip_trivia();
        let size = self.scan_number().unwrap_or(0).max(0) as u64;
        self.skip_trivia();
        if self.peek_byte() == Some(b'{') {
            self.skip_balanced_braces();
        } else {
            warn!("expected '{{' after 'pool {name}', skipping to end of line");
            self.skip_to_eol();
        }
        self.meta.tiles.record(&name, size);
    }

    /// `unified { i: n, e: n, r: n }` — fields may appear in any order;
    /// unspecified fields default to 0 before clamping.
    fn compile_unified(&mut self) {
        self.consume_keyword("unified");
        self.skip_trivia();
        if self.peek_byte() != Some(b'{') {
            warn!("expected '{{' after 'unified', skipping to end of line");
            self.skip_to_eol();
            return;
        }
        self.consume_keyword("{");

        let mut fields = Metadata::default().unified;
        loop {
            self.skip_trivia();
            match self.peek_byte() {
                None => break,
                Some(b'}') => {
                    self.consume_keyword("}");
                    break;
                }
                Some(b',') => {
                    self.consume_keyword(",");
                    continue;
                }
                _ => {}
            }
            let Some(name) = self.scan_identifier() else {
                // Not a recognisable field name; advance one byte so a
                // malformed `unified` block can't loop forever.
                self.advance_one();
                continue;
            };
            self.skip_trivia();
            if self.peek_byte() == Some(b':') {
                self.consume_keyword(":");
            }
            self.skip_trivia();
            let value = self.scan_float().unwrap_or(0.0);
            match name.as_str() {
                "i" => fields.i = value,
                "e" => fields.e = value,
                "r" => fields.r = value,
                other => warn!("unknown unified field '{other}', ignoring"),
            }
        }
        self.meta.unified.set(fields.i, fields.e, fields.r);
    }

    /// Everything that isn't a fixed keyword: the purely-syntactic dotted
    /// forms, `syscall.*`, the named block-skip declarations, and ordinary
    /// `name = expr` / `name(args…)` statements.
    fn compile_identifier_statement(&mut self) {
        let start = self.pos_for_diagnostics();
        let Some(name) = self.scan_identifier() else {
            warn!("unrecognised statement at byte {start}, skipping to end of line");
            self.skip_to_eol();
            return;
        };

        if name == "platform.probe" || name == "bridge.read" || name == "compat.probe" {
            return;
        }

        if let Some(sys_name) = name.strip_prefix("syscall.") {
            self.skip_trivia();
            if self.peek_byte() == Some(b'(') {
                self.consume_keyword("(");
                self.compile_syscall(sys_name);
            } else {
                warn!("'{name}' used without call syntax, skipping to end of line");
                self.skip_to_eol();
            }
            return;
        }

        if BLOCK_SKIP_KEYWORDS.contains(&name.as_str()) {
            self.skip_trivia();
            if self.peek_byte() == Some(b'{') {
                self.skip_balanced_braces();
                return;
            }
            // Not followed by a block — treat `name` as an ordinary
            // identifier below (it may simply be a variable named e.g. "db").
        }

        self.skip_trivia();
        match self.peek_byte() {
            Some(b'=') if self.peek_byte_at(1) != Some(b'=') => {
                self.consume_keyword("=");
                self.skip_trivia();
                self.compile_assignment(&name);
            }
            Some(b'(') => {
                self.consume_keyword("(");
                self.compile_call(&name);
            }
            _ => {
                warn!("unknown statement construct referencing '{name}', skipping to end of line");
                self.skip_to_eol();
            }
        }
    }
}
