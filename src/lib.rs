//! `collapse` — a single-pass recursive-descent compiler that translates a
//! small imperative language directly into x86-64 machine code wrapped in a
//! minimal ELF64 executable. No IR, no register allocation, no linker: each
//! statement and expression is turned into its final bytes the moment the
//! parser recognises it.
//!
//! The five layers, bottom to top: [`buffer`] (the byte emitter), [`isa`]
//! (the instruction encoder), [`symtab`]/[`fixup`] (variable/function
//! records and label backpatching), [`parser`] (the recursive-descent
//! front end that drives everything below it), and [`elf`] (the final
//! executable image writer). [`lexer`] is the shared scanning primitive
//! `parser` is built on; [`meta`] and [`report`] are the ambient
//! statistics-only subsystems that never influence emitted code.
pub mod buffer;
pub mod elf;
pub mod error;
pub mod fixup;
pub mod isa;
pub mod lexer;
pub mod meta;
pub mod parser;
pub mod report;
pub mod symtab;

pub use error::{Error, Result};
pub use parser::Compiler;
