//! A single ELF64 program header entry. Only `Pwrite` is derived here since
//! this module only ever builds a fresh header, never parses one back out
//! of an existing binary.
use scroll::Pwrite;

pub const SIZEOF_PHDR: usize = 56;

pub const PT_LOAD: u32 = 1;

pub const PF_X: u32 = 1;
pub const PF_W: u32 = 2;
pub const PF_R: u32 = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pwrite)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}
