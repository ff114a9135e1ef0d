//! Layer 5 — ELF64 emission.
//!
//! Serialises a finished code buffer into a freestanding ELF64 executable:
//! one 64-byte file header, one 56-byte `PT_LOAD` program header, then the
//! code verbatim. There's no section table, no dynamic linking, and no
//! relocation — the whole image maps at a single fixed address.
mod header;
mod program_header;

pub use header::Header;
pub use program_header::ProgramHeader;

use scroll::{Pwrite, LE};

/// File base virtual address.
pub const BASE_ADDRESS: u64 = 0x400000;
/// Entry point offset within the file/image: right after the 64-byte ELF
/// header and the 56-byte program header.
pub const ENTRY_OFFSET: u64 = 120;
/// Fixed base address globals are assigned from.
pub const GLOBAL_BASE: u64 = 0x600000;

/// Build a complete ELF64 executable image: header, one RWX `PT_LOAD`
/// segment, then the code buffer's contents.
///
/// `global_bytes` is the number of bytes claimed by declared globals
/// (`8 * global_count`); it only affects `p_memsz`, since globals never
/// appear in the file image itself — the single segment's `p_memsz`
/// deliberately exceeds its `p_filesz` so the kernel zero-fills the extra
/// range at load time instead of the file having to carry explicit zero
/// bytes for every global.
pub fn write_executable(code: &[u8], global_bytes: u64) -> Vec<u8> {
    let code_length = code.len() as u64;
    let filesz = ENTRY_OFFSET + code_length;
    let memsz = (GLOBAL_BASE - BASE_ADDRESS) + global_bytes.max(0x1000) + 0x10000;

    let header = Header {
        e_ident: ident_bytes(),
        e_type: header::ET_EXEC,
        e_machine: header::EM_X86_64,
        e_version: 1,
        e_entry: BASE_ADDRESS + ENTRY_OFFSET,
        e_phoff: 64,
        e_shoff: 0,
        e_flags: 0,
        e_ehsize: header::SIZEOF_EHDR as u16,
        e_phentsize: program_header::SIZEOF_PHDR as u16,
        e_phnum: 1,
        e_shentsize: 0,
        e_shnum: 0,
        e_shstrndx: 0,
    };

    let phdr = ProgramHeader {
        p_type: program_header::PT_LOAD,
        p_flags: program_header::PF_R | program_header::PF_W | program_header::PF_X,
        p_offset: 0,
        p_vaddr: BASE_ADDRESS,
        p_paddr: BASE_ADDRESS,
        p_filesz: filesz,
        p_memsz: memsz,
        p_align: 0x1000,
    };

    let mut out = vec![0u8; (ENTRY_OFFSET + code_length) as usize];
    let mut offset = 0usize;
    out.pwrite_with(header, offset, LE).expect("ELF header always fits");
    offset = 64;
    out.pwrite_with(phdr, offset, LE).expect("program header always fits");
    out[ENTRY_OFFSET as usize..].copy_from_slice(code);
    out
}

fn ident_bytes() -> [u8; header::SIZEOF_IDENT] {
    let mut ident = [0u8; header::SIZEOF_IDENT];
    ident[0..4].copy_from_slice(header::ELF_MAGIC);
    ident[4] = header::ELFCLASS64;
    ident[5] = header::ELFDATA2LSB;
    ident[6] = header::EV_CURRENT;
    ident[7] = header::ELFOSABI_SYSV;
    ident
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_entry_point_are_valid() {
        let code = vec![0x90; 16];
        let image = write_executable(&code, 0);
        assert_eq!(&image[0..4], header::ELF_MAGIC);
        let entry = u64::from_le_bytes(image[24..32].try_into().unwrap());
        assert_eq!(entry, BASE_ADDRESS + ENTRY_OFFSET);
        let phnum = u16::from_le_bytes(image[56..58].try_into().unwrap());
        assert_eq!(phnum, 1);
        assert_eq!(&image[ENTRY_OFFSET as usize..], &code[..]);
    }

    #[test]
    fn memsz_covers_global_space() {
        let image = write_executable(&[], 8 * 10);
        let phdr_start = 64usize;
        let memsz = u64::from_le_bytes(image[phdr_start + 40..phdr_start + 48].try_into().unwrap());
        assert_eq!(memsz, (GLOBAL_BASE - BASE_ADDRESS) + 0x1000 + 0x10000);
    }
}
