//! Layer 2 — the x86-64 System V instruction encoder.
//!
//! Exposes one named method per instruction the front end actually emits.
//! Every method writes exactly the bytes of that instruction at the current
//! cursor and touches no other state. Register usage is fixed by
//! convention rather than made generic: `rax` is the register every
//! expression evaluates into, `rbx` is scratch for the right-hand operand
//! of a binary op, `rbp`/`rsp` are the frame and stack pointers. Syscall
//! arguments use the real Linux x86-64 syscall ABI
//! (`rdi, rsi, rdx, r10, r8, r9`, count in `rax`) rather than the C-call
//! argument registers, since `r10` (not `rcx`) is what the `syscall`
//! instruction's hardware convention actually reads.
use crate::buffer::CodeBuffer;

/// The six Linux x86-64 syscall argument registers, in argument order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgReg {
    Rdi,
    Rsi,
    Rdx,
    R10,
    R8,
    R9,
}

impl ArgReg {
    pub const ORDER: [ArgReg; 6] = [
        ArgReg::Rdi,
        ArgReg::Rsi,
        ArgReg::Rdx,
        ArgReg::R10,
        ArgReg::R8,
        ArgReg::R9,
    ];
}

/// The six ordering comparison predicates the front end compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[inline]
fn modrm(md: u8, reg: u8, rm: u8) -> u8 {
    (md << 6) | ((reg & 7) << 3) | (rm & 7)
}

/// Thin wrapper that turns a `CodeBuffer` into an x86-64 assembler. All
/// methods borrow the buffer mutably and return nothing; callers read back
/// `buf.cursor()` before/after to learn fixup-relevant offsets.
pub struct Isa;

impl Isa {
    // ---- stack -----------------------------------------------------

    pub fn push_rax(buf: &mut CodeBuffer) {
        buf.emit_byte(0x50);
    }
    pub fn push_rbx(buf: &mut CodeBuffer) {
        buf.emit_byte(0x53);
    }
    pub fn push_rbp(buf: &mut CodeBuffer) {
        buf.emit_byte(0x55);
    }
    pub fn pop_rax(buf: &mut CodeBuffer) {
        buf.emit_byte(0x58);
    }
    pub fn pop_rbx(buf: &mut CodeBuffer) {
        buf.emit_byte(0x5B);
    }
    pub fn pop_rbp(buf: &mut CodeBuffer) {
        buf.emit_byte(0x5D);
    }

    // ---- moves -------------------------------------------------------

    /// `mov rax, imm64`
    pub fn mov_rax_imm64(buf: &mut CodeBuffer, imm: u64) {
        buf.emit_bytes(&[0x48, 0xB8]);
        buf.emit_u64(imm);
    }
    /// `mov rbx, imm64`
    pub fn mov_rbx_imm64(buf: &mut CodeBuffer, imm: u64) {
        buf.emit_bytes(&[0x48, 0xBB]);
        buf.emit_u64(imm);
    }
    /// `mov rbp, rsp`
    pub fn mov_rbp_rsp(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x89, modrm(0b11, 4, 5)]);
    }
    /// `mov rsp, rbp`
    pub fn mov_rsp_rbp(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x89, modrm(0b11, 5, 4)]);
    }
    /// `mov rax, rbx`
    pub fn mov_rax_rbx(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x89, modrm(0b11, 3, 0)]);
    }
    /// `mov rbx, rax`
    pub fn mov_rbx_rax(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x89, modrm(0b11, 0, 3)]);
    }
    /// `mov rcx, rax` (scratch save used by division)
    pub fn mov_rcx_rax(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x89, modrm(0b11, 0, 1)]);
    }
    /// `mov rax, rcx`
    pub fn mov_rax_rcx(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x89, modrm(0b11, 1, 0)]);
    }

    /// `mov <argreg>, rax` — copy the first integer register into one of
    /// the six syscall argument registers.
    pub fn mov_argreg_rax(buf: &mut CodeBuffer, reg: ArgReg) {
        match reg {
            ArgReg::Rdi => buf.emit_bytes(&[0x48, 0x89, modrm(0b11, 0, 7)]),
            ArgReg::Rsi => buf.emit_bytes(&[0x48, 0x89, modrm(0b11, 0, 6)]),
            ArgReg::Rdx => buf.emit_bytes(&[0x48, 0x89, modrm(0b11, 0, 2)]),
            ArgReg::R10 => buf.emit_bytes(&[0x49, 0x89, modrm(0b11, 0, 2)]),
            ArgReg::R8 => buf.emit_bytes(&[0x49, 0x89, modrm(0b11, 0, 0)]),
            ArgReg::R9 => buf.emit_bytes(&[0x49, 0x89, modrm(0b11, 0, 1)]),
        }
    }

    /// `mov eax, imm32` (zero-extends into rax) — used for syscall numbers
    /// and the specialised literal-`exit` fast path.
    pub fn mov_eax_imm32(buf: &mut CodeBuffer, imm: u32) {
        buf.emit_byte(0xB8);
        buf.emit_u32(imm);
    }
    /// `mov edi, imm32`
    pub fn mov_edi_imm32(buf: &mut CodeBuffer, imm: u32) {
        buf.emit_byte(0xBF);
        buf.emit_u32(imm);
    }

    /// `mov <argreg>, imm32` (zero-extends into the full 64-bit register) —
    /// used for literal syscall arguments (fd numbers, fixed lengths) that
    /// never need to round-trip through an expression.
    pub fn mov_argreg_imm32(buf: &mut CodeBuffer, reg: ArgReg, imm: u32) {
        match reg {
            ArgReg::Rdi => buf.emit_byte(0xBF),
            ArgReg::Rsi => buf.emit_byte(0xBE),
            ArgReg::Rdx => buf.emit_byte(0xBA),
            ArgReg::R10 => buf.emit_bytes(&[0x41, 0xBA]),
            ArgReg::R8 => buf.emit_bytes(&[0x41, 0xB8]),
            ArgReg::R9 => buf.emit_bytes(&[0x41, 0xB9]),
        }
        buf.emit_u32(imm);
    }

    /// `xchg rax, rbx` — used only to flip operand order ahead of `idiv`,
    /// whose dividend is hardwired to `rax` regardless of which side of a
    /// `/` expression it came from.
    pub fn xchg_rax_rbx(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x93]);
    }

    // ---- absolute-address load/store (globals) ------------------------

    /// Load the 8 bytes at `addr` into `rax`.
    pub fn load_absolute(buf: &mut CodeBuffer, addr: u64) {
        Self::mov_rax_imm64(buf, addr);
        Self::load_qword_rax_ptr(buf);
    }

    /// Store `rax` to the 8 bytes at `addr`, preserving `rax` across the
    /// address materialisation by round-tripping it through the stack.
    pub fn store_absolute(buf: &mut CodeBuffer, addr: u64) {
        Self::push_rax(buf);
        Self::mov_rbx_imm64(buf, addr);
        Self::pop_rax(buf);
        Self::store_qword_rbx_ptr(buf);
    }

    // ---- runtime-address byte load/store (peek/poke) -------------------
    //
    // Unlike globals, `peek`/`poke` take an address that is itself the
    // result of an expression, so the address has to already be sitting in
    // a register (`rax` for loads, `rbx` for stores) rather than folded
    // into the instruction as an immediate.

    /// `mov rax, [rax]` — load the 8 bytes at the address already in `rax`.
    pub fn load_qword_rax_ptr(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x8B, modrm(0b00, 0, 0)]);
    }
    /// `mov [rbx], rax` — store `rax` to the address already in `rbx`.
    pub fn store_qword_rbx_ptr(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x89, modrm(0b00, 0, 3)]);
    }
    /// `movzx rax, byte [rax]` — load the byte at the address in `rax`.
    pub fn load_byte_rax_ptr(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x0F, 0xB6, modrm(0b00, 0, 0)]);
    }
    /// `mov [rbx], al` — store the low byte of `rax` to the address in `rbx`.
    pub fn store_byte_rbx_ptr(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x88, modrm(0b00, 0, 3)]);
    }

    // ---- frame-relative load/store (locals/parameters) ------------------

    /// `mov rax, [rbp + disp32]`
    pub fn load_rax_from_frame(buf: &mut CodeBuffer, disp: i32) {
        buf.emit_bytes(&[0x48, 0x8B, modrm(0b10, 0, 5)]);
        buf.emit_i32(disp);
    }
    /// `mov [rbp + disp32], rax`
    pub fn store_rax_to_frame(buf: &mut CodeBuffer, disp: i32) {
        buf.emit_bytes(&[0x48, 0x89, modrm(0b10, 0, 5)]);
        buf.emit_i32(disp);
    }

    // ---- stack red-zone byte transfer (putchar/byte/getchar) -----------

    /// `mov rsi, rsp`
    pub fn mov_rsi_rsp(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x89, modrm(0b11, 4, 6)]);
    }
    /// `mov [rsp], al` — `rsp`-based memory operands always carry a SIB byte.
    pub fn store_byte_rsp_ptr(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x88, 0x04, 0x24]);
    }
    /// `movzx rax, byte [rsp]`
    pub fn load_byte_rsp_ptr(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x0F, 0xB6, 0x04, 0x24]);
    }

    // ---- arithmetic ----------------------------------------------------

    /// `rax += rbx` — commutative, result already in the first register.
    pub fn add_rax_rbx(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x01, modrm(0b11, 3, 0)]);
    }
    /// `rbx -= rax; rax = rbx` — computes (second operand) - (first
    /// operand), i.e. left-hand-side minus right-hand-side.
    pub fn sub_into_rax(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x29, modrm(0b11, 0, 3)]); // sub rbx, rax
        Self::mov_rax_rbx(buf);
    }
    /// `rax *= rbx` — commutative, result already in the first register.
    pub fn imul_rax_rbx(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x0F, 0xAF, modrm(0b11, 0, 3)]);
    }
    /// Signed divide: sign-extends `rax` into `rdx:rax` (`cqo`) and divides
    /// by `rbx`. Quotient lands back in `rax` as a side effect of `idiv`
    /// itself.
    pub fn idiv_rax_by_rbx(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x48, 0x99]); // cqo
        buf.emit_bytes(&[0x48, 0xF7, modrm(0b11, 7, 3)]); // idiv rbx
    }

    // ---- comparisons ---------------------------------------------------

    /// `cmp rbx, rax` (flags reflect left-hand-side minus right-hand-side),
    /// then `setcc al; movzx rax, al`.
    pub fn compare_set(buf: &mut CodeBuffer, cond: Cond) {
        buf.emit_bytes(&[0x48, 0x39, modrm(0b11, 0, 3)]); // cmp rbx, rax
        let setcc_opcode = match cond {
            Cond::Eq => 0x94,
            Cond::Ne => 0x95,
            Cond::Lt => 0x9C,
            Cond::Ge => 0x9D,
            Cond::Le => 0x9E,
            Cond::Gt => 0x9F,
        };
        buf.emit_bytes(&[0x0F, setcc_opcode, modrm(0b11, 0, 0)]); // setcc al
        buf.emit_bytes(&[0x48, 0x0F, 0xB6, modrm(0b11, 0, 0)]); // movzx rax, al
    }

    // ---- control flow ---------------------------------------------------

    /// `test rax, rax; jz rel32` — emits the opcode and four placeholder
    /// zero bytes for the displacement; returns the offset of those four
    /// bytes so the caller can register a fixup.
    pub fn test_and_jz(buf: &mut CodeBuffer) -> usize {
        buf.emit_bytes(&[0x48, 0x85, modrm(0b11, 0, 0)]); // test rax, rax
        buf.emit_bytes(&[0x0F, 0x84]); // jz rel32
        let fixup_at = buf.cursor();
        buf.emit_i32(0);
        fixup_at
    }

    /// `jmp rel32`; returns the fixup offset.
    pub fn jmp(buf: &mut CodeBuffer) -> usize {
        buf.emit_byte(0xE9);
        let fixup_at = buf.cursor();
        buf.emit_i32(0);
        fixup_at
    }

    /// `call rel32`; returns the fixup offset.
    pub fn call(buf: &mut CodeBuffer) -> usize {
        buf.emit_byte(0xE8);
        let fixup_at = buf.cursor();
        buf.emit_i32(0);
        fixup_at
    }

    pub fn syscall(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x0F, 0x05]);
    }

    pub fn ret(buf: &mut CodeBuffer) {
        buf.emit_byte(0xC3);
    }

    /// `add rsp, imm32`
    pub fn add_rsp_imm32(buf: &mut CodeBuffer, imm: i32) {
        buf.emit_bytes(&[0x48, 0x81, modrm(0b11, 0, 4)]);
        buf.emit_i32(imm);
    }
    /// `sub rsp, imm32`
    pub fn sub_rsp_imm32(buf: &mut CodeBuffer, imm: i32) {
        buf.emit_bytes(&[0x48, 0x81, modrm(0b11, 5, 4)]);
        buf.emit_i32(imm);
    }

    /// Function/program prologue: `push rbp; mov rbp, rsp; sub rsp, reserve`.
    pub fn prologue(buf: &mut CodeBuffer, reserve: i32) {
        Self::push_rbp(buf);
        Self::mov_rbp_rsp(buf);
        Self::sub_rsp_imm32(buf, reserve);
    }

    /// Function/program epilogue: `mov rsp, rbp; pop rbp; ret`.
    pub fn epilogue(buf: &mut CodeBuffer) {
        Self::mov_rsp_rbp(buf);
        Self::pop_rbp(buf);
        Self::ret(buf);
    }

    /// `keep`: a tight self-spin — `pause; jmp -2` (the short jump's
    /// displacement literally is `-2`, looping on the jump itself).
    pub fn keep_spin(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0xF3, 0x90]); // pause
        buf.emit_bytes(&[0xEB, 0xFE]); // jmp short -2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_are_single_bytes() {
        let mut buf = CodeBuffer::with_capacity(16, "test");
        Isa::push_rax(&mut buf);
        Isa::push_rbx(&mut buf);
        Isa::push_rbp(&mut buf);
        assert_eq!(buf.as_slice(), &[0x50, 0x53, 0x55]);
    }

    #[test]
    fn mov_imm64_is_ten_bytes() {
        let mut buf = CodeBuffer::with_capacity(16, "test");
        Isa::mov_rax_imm64(&mut buf, 0x600000);
        assert_eq!(buf.cursor(), 10);
        assert_eq!(&buf.as_slice()[0..2], &[0x48, 0xB8]);
    }

    #[test]
    fn test_and_jz_reserves_four_zero_bytes() {
        let mut buf = CodeBuffer::with_capacity(16, "test");
        let at = Isa::test_and_jz(&mut buf);
        assert_eq!(&buf.as_slice()[at..at + 4], &[0, 0, 0, 0]);
    }

    #[test]
    fn keep_spin_is_four_bytes() {
        let mut buf = CodeBuffer::with_capacity(16, "test");
        Isa::keep_spin(&mut buf);
        assert_eq!(buf.as_slice(), &[0xF3, 0x90, 0xEB, 0xFE]);
    }

    #[test]
    fn frame_load_store_use_disp32_addressing() {
        let mut buf = CodeBuffer::with_capacity(32, "test");
        Isa::store_rax_to_frame(&mut buf, -8);
        Isa::load_rax_from_frame(&mut buf, 16);
        assert_eq!(&buf.as_slice()[0..3], &[0x48, 0x89, modrm(0b10, 0, 5)]);
        assert_eq!(&buf.as_slice()[7..10], &[0x48, 0x8B, modrm(0b10, 0, 5)]);
    }

    #[test]
    fn rsp_pointer_byte_ops_use_sib_byte() {
        let mut buf = CodeBuffer::with_capacity(16, "test");
        Isa::store_byte_rsp_ptr(&mut buf);
        assert_eq!(buf.as_slice(), &[0x88, 0x04, 0x24]);
    }

    #[test]
    fn mov_argreg_imm32_uses_rex_for_extended_registers() {
        let mut buf = CodeBuffer::with_capacity(16, "test");
        Isa::mov_argreg_imm32(&mut buf, ArgReg::Rdi, 1);
        assert_eq!(&buf.as_slice()[0..1], &[0xBF]);

        let mut buf = CodeBuffer::with_capacity(16, "test");
        Isa::mov_argreg_imm32(&mut buf, ArgReg::R10, 0);
        assert_eq!(&buf.as_slice()[0..2], &[0x41, 0xBA]);
    }

    #[test]
    fn xchg_rax_rbx_is_two_bytes() {
        let mut buf = CodeBuffer::with_capacity(16, "test");
        Isa::xchg_rax_rbx(&mut buf);
        assert_eq!(buf.as_slice(), &[0x48, 0x93]);
    }
}
