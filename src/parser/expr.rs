//! Expression grammar plus the value-producing call forms: `syscall.*`, the
//! `peek`/`poke`/`putchar`/`byte`/`getchar` builtins, and user-defined
//! function calls. Every expression leaves its result in `rax`.
//!
//! Binary operators are parsed left-to-right with no precedence
//! stratification: after a primary is parsed, a trailing operator consumes
//! the *entire remaining expression* as its right-hand side via a
//! recursive call to `compile_expr`. This is equivalent to fully
//! parenthesising from the right — `a + b + c` compiles as `a + (b + c)` —
//! a deliberate simplification rather than an oversight.
use log::warn;

use crate::isa::{ArgReg, Cond, Isa};
use crate::symtab::Scope;

use super::Compiler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Compiler {
    pub(crate) fn compile_expr(&mut self) {
        self.compile_primary();
        self.skip_trivia();
        if let Some((op, len)) = self.peek_binary_op() {
            self.pos_advance(len);
            self.skip_trivia();
            Isa::push_rax(&mut self.code);
            // Right-associative: the rest of the expression, however long,
            // is parsed as one subexpression.
            self.compile_expr();
            Isa::pop_rbx(&mut self.code); // rbx = lhs, rax = rhs
            self.apply_binary_op(op);
        }
    }

    fn compile_primary(&mut self) {
        self.skip_trivia();
        match self.peek_byte() {
            Some(b'(') => {
                self.pos_advance(1);
                self.skip_trivia();
                self.compile_expr();
                self.skip_trivia();
                if self.peek_byte() == Some(b')') {
                    self.pos_advance(1);
                }
            }
            Some(b'"') => {
                let bytes = self.scan_string().unwrap_or_default();
                let addr = self.emit_inline_bytes(&bytes);
                Isa::mov_rax_imm64(&mut self.code, addr);
            }
            Some(b) if b == b'-' || b.is_ascii_digit() => match self.scan_number() {
                Some(v) => Isa::mov_rax_imm64(&mut self.code, v as u64),
                None => Isa::mov_eax_imm32(&mut self.code, 0),
            },
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => match self.scan_identifier() {
                Some(name) => self.compile_identifier_usage(&name),
                None => Isa::mov_eax_imm32(&mut self.code, 0),
            },
            _ => {
                warn!("expected an expression, found none — compiling as 0");
                Isa::mov_eax_imm32(&mut self.code, 0);
            }
        }
    }

    fn peek_binary_op(&self) -> Option<(BinOp, usize)> {
        let b0 = self.peek_byte()?;
        let b1 = self.peek_byte_at(1);
        match (b0, b1) {
            (b'=', Some(b'=')) => Some((BinOp::Eq, 2)),
            (b'!', Some(b'=')) => Some((BinOp::Ne, 2)),
            (b'<', Some(b'=')) => Some((BinOp::Le, 2)),
            (b'>', Some(b'=')) => Some((BinOp::Ge, 2)),
            (b'<', _) => Some((BinOp::Lt, 1)),
            (b'>', _) => Some((BinOp::Gt, 1)),
            (b'+', _) => Some((BinOp::Add, 1)),
            (b'-', _) => Some((BinOp::Sub, 1)),
            (b'*', _) => Some((BinOp::Mul, 1)),
            (b'/', _) => Some((BinOp::Div, 1)),
            _ => None,
        }
    }

    fn apply_binary_op(&mut self, op: BinOp) {
        match op {
            BinOp::Add => Isa::add_rax_rbx(&mut self.code),
            BinOp::Sub => Isa::sub_into_rax(&mut self.code),
            BinOp::Mul => Isa::imul_rax_rbx(&mut self.code),
            BinOp::Div => {
                // `idiv`'s dividend is hardwired to rax; our push/pop
                // convention leaves the right-hand side there, so the
                // operands must be flipped to divide lhs by rhs.
                Isa::xchg_rax_rbx(&mut self.code);
                Isa::idiv_rax_by_rbx(&mut self.code);
            }
            BinOp::Eq => Isa::compare_set(&mut self.code, Cond::Eq),
            BinOp::Ne => Isa::compare_set(&mut self.code, Cond::Ne),
            BinOp::Lt => Isa::compare_set(&mut self.code, Cond::Lt),
            BinOp::Le => Isa::compare_set(&mut self.code, Cond::Le),
            BinOp::Gt => Isa::compare_set(&mut self.code, Cond::Gt),
            BinOp::Ge => Isa::compare_set(&mut self.code, Cond::Ge),
        }
    }

    /// An identifier that has just been scanned: a call if followed by
    /// `(`, otherwise a variable load. Shared by `compile_primary` and by
    /// `stmt.rs`'s bare `name(args…)` statement handling.
    pub(crate) fn compile_identifier_usage(&mut self, name: &str) {
        self.skip_trivia();
        if self.peek_byte() == Some(b'(') {
            self.pos_advance(1);
            self.compile_call(name);
        } else {
            self.compile_variable_load(name);
        }
    }

    pub(crate) fn compile_variable_load(&mut self, name: &str) {
        match self.symtab.lookup(name).cloned() {
            Some(var) => match var.scope {
                Scope::Local | Scope::Parameter => {
                    Isa::load_rax_from_frame(&mut self.code, var.frame_offset)
                }
                Scope::Global => Isa::load_absolute(&mut self.code, var.address),
            },
            // Undeclared variable read compiles as a constant zero.
            None => {
                warn!("undeclared variable '{name}' read as 0");
                Isa::mov_eax_imm32(&mut self.code, 0);
            }
        }
    }

    pub(crate) fn compile_assignment(&mut self, name: &str) {
        self.compile_expr();
        let var = match self.symtab.lookup(name).cloned() {
            Some(v) => v,
            None => self.symtab.declare(name),
        };
        match var.scope {
            Scope::Local | Scope::Parameter => {
                Isa::store_rax_to_frame(&mut self.code, var.frame_offset)
            }
            Scope::Global => Isa::store_absolute(&mut self.code, var.address),
        }
    }

    /// Dispatch a call after its `(` has already been consumed: the
    /// built-in single-byte I/O forms, or an ordinary user function call.
    /// `syscall.*` is routed separately by callers since it carries its own
    /// name prefix.
    pub(crate) fn compile_call(&mut self, name: &str) {
        match name {
            "peek" => self.compile_peek(),
            "poke" => self.compile_poke(),
            "putchar" | "byte" => self.compile_putchar(),
            "getchar" => self.compile_getchar(),
            _ => self.compile_user_call(name),
        }
    }

    fn compile_peek(&mut self) {
        self.skip_trivia();
        self.compile_expr();
        self.skip_trivia();
        if self.peek_byte() == Some(b')') {
            self.pos_advance(1);
        }
        Isa::load_byte_rax_ptr(&mut self.code);
    }

    fn compile_poke(&mut self) {
        self.skip_trivia();
        self.compile_expr(); // address -> rax
        Isa::push_rax(&mut self.code);
        self.skip_trivia();
        if self.peek_byte() == Some(b',') {
            self.pos_advance(1);
            self.skip_trivia();
        }
        self.compile_expr(); // value -> rax
        Isa::pop_rbx(&mut self.code); // rbx = address
        Isa::store_byte_rbx_ptr(&mut self.code);
        self.skip_trivia();
        if self.peek_byte() == Some(b')') {
            self.pos_advance(1);
        }
    }

    /// `putchar(n)`/`byte(n)`: write one byte to stdout through a red-zone
    /// slot below the live stack.
    fn compile_putchar(&mut self) {
        self.skip_trivia();
        self.compile_expr();
        self.skip_trivia();
        if self.peek_byte() == Some(b')') {
            self.pos_advance(1);
        }
        Isa::store_byte_rsp_ptr(&mut self.code);
        Isa::mov_rsi_rsp(&mut self.code);
        Isa::mov_argreg_imm32(&mut self.code, ArgReg::Rdi, 1);
        Isa::mov_argreg_imm32(&mut self.code, ArgReg::Rdx, 1);
        Isa::mov_eax_imm32(&mut self.code, 1); // write
        Isa::syscall(&mut self.code);
    }

    /// `getchar()`: read one byte from stdin into the same red-zone slot,
    /// then load it back zero-extended into rax.
    fn compile_getchar(&mut self) {
        self.skip_trivia();
        if self.peek_byte() == Some(b')') {
            self.pos_advance(1);
        }
        Isa::mov_argreg_imm32(&mut self.code, ArgReg::Rdi, 0);
        Isa::mov_rsi_rsp(&mut self.code);
        Isa::mov_argreg_imm32(&mut self.code, ArgReg::Rdx, 1);
        Isa::mov_eax_imm32(&mut self.code, 0); // read
        Isa::syscall(&mut self.code);
        Isa::load_byte_rsp_ptr(&mut self.code);
    }

    /// `name(args…)`: push each argument left-to-right, call, then pop
    /// `8*argc` bytes back off. Arguments live on the stack,
    /// read by the callee through its frame-relative parameter offsets —
    /// unlike `syscall.*`, there is no register-passing step here.
    fn compile_user_call(&mut self, name: &str) {
        let argc = self.compile_pushed_arg_list();
        let fixup_at = Isa::call(&mut self.code);
        self.fixups.add_pending(fixup_at, name);
        if argc > 0 {
            Isa::add_rsp_imm32(&mut self.code, 8 * argc as i32);
        }
    }

    /// `syscall.<name>(args…)`, entered with the `(` already consumed.
    pub(crate) fn compile_syscall(&mut self, name: &str) {
        if name == "exit" {
            if let Some(value) = self.try_literal_exit_arg() {
                Isa::mov_edi_imm32(&mut self.code, value as u32);
                Isa::mov_eax_imm32(&mut self.code, 60);
                Isa::syscall(&mut self.code);
                return;
            }
        }

        let argc = self.compile_pushed_arg_list();
        for reg in ArgReg::ORDER.iter().take(argc).rev() {
            Isa::pop_rax(&mut self.code);
            Isa::mov_argreg_rax(&mut self.code, *reg);
        }
        Isa::mov_eax_imm32(&mut self.code, syscall_number(name));
        Isa::syscall(&mut self.code);
    }

    /// `exit` with a bare integer literal skips the expression machinery
    /// entirely. Tries to parse `<number> )` without consuming
    /// anything on failure so the general syscall path can still run.
    fn try_literal_exit_arg(&mut self) -> Option<i64> {
        let save = self.pos_snapshot();
        self.skip_trivia();
        if let Some(v) = self.scan_number() {
            self.skip_trivia();
            if self.peek_byte() == Some(b')') {
                self.pos_advance(1);
                return Some(v);
            }
        }
        self.pos_restore(save);
        None
    }

    /// Parse a comma-separated argument list up to and including the
    /// closing `)`, compiling and pushing each argument's value in order.
    /// Returns the argument count.
    fn compile_pushed_arg_list(&mut self) -> usize {
        self.skip_trivia();
        if self.peek_byte() == Some(b')') {
            self.pos_advance(1);
            return 0;
        }
        let mut n = 0usize;
        loop {
            self.compile_expr();
            Isa::push_rax(&mut self.code);
            n += 1;
            self.skip_trivia();
            match self.peek_byte() {
                Some(b',') => {
                    self.pos_advance(1);
                    self.skip_trivia();
                }
                Some(b')') => {
                    self.pos_advance(1);
                    break;
                }
                _ => break,
            }
        }
        n
    }
}

/// Linux x86-64 syscall numbers for the handful of syscalls this language
/// exposes directly.
fn syscall_number(name: &str) -> u32 {
    match name {
        "exit" => 60,
        "write" => 1,
        "read" => 0,
        "open" => 2,
        "close" => 3,
        "mmap" => 9,
        other => {
            warn!("unknown syscall.{other}, using number 0");
            0
        }
    }
}
