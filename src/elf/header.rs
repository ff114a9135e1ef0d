//! The 64-byte ELF64 file header, one field per entry in the on-disk
//! layout. `#[derive(Pwrite)]` serialises the struct in field order under a
//! little-endian context, so the struct definition below doubles as the
//! wire format.
use scroll::Pwrite;

pub const SIZEOF_IDENT: usize = 16;
pub const SIZEOF_EHDR: usize = 64;

pub const ELF_MAGIC: &[u8; 4] = b"\x7FELF";
pub const ELFCLASS64: u8 = 2;
pub const ELFDATA2LSB: u8 = 1;
pub const EV_CURRENT: u8 = 1;
pub const ELFOSABI_SYSV: u8 = 0;

pub const ET_EXEC: u16 = 2;
pub const EM_X86_64: u16 = 0x3E;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pwrite)]
pub struct Header {
    pub e_ident: [u8; SIZEOF_IDENT],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}
