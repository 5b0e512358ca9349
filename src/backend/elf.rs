//! ELF32 records and little-endian buffer helpers.
//!
//! Only the subset this toolchain produces and consumes: ET_REL objects
//! with one `.text` section plus symbol/string/relocation tables, and
//! ET_EXEC images with a single PT_LOAD segment. Every struct writes its
//! fixed on-disk layout field by field, so the byte offsets below are
//! the format, not a serialization detail.

pub const EHDR_SIZE: usize = 52;
pub const PHDR_SIZE: usize = 32;
pub const SHDR_SIZE: usize = 40;
pub const SYM_SIZE: usize = 16;
pub const REL_SIZE: usize = 8;

pub const ET_REL: u16 = 1;
pub const ET_EXEC: u16 = 2;
pub const EM_386: u16 = 3;

pub const PT_LOAD: u32 = 1;
pub const PF_X: u32 = 0x1;
pub const PF_R: u32 = 0x4;

pub const SHT_NULL: u32 = 0;
pub const SHT_PROGBITS: u32 = 1;
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_REL: u32 = 9;

pub const SHF_ALLOC: u32 = 0x2;
pub const SHF_EXECINSTR: u32 = 0x4;

pub const SHN_UNDEF: u16 = 0;
pub const SHN_ABS: u16 = 0xfff1;

pub const STB_LOCAL: u8 = 0;
pub const STB_GLOBAL: u8 = 1;

pub const STT_NOTYPE: u8 = 0;
pub const STT_SECTION: u8 = 3;
pub const STT_FILE: u8 = 4;

pub const R_386_PC32: u8 = 2;

/// Virtual address executables load at. The whole file maps as one
/// segment from offset 0, so file offset x lands at `LOAD_BASE + x`.
pub const LOAD_BASE: u32 = 0x0804_8000;

#[derive(Debug, Clone)]
pub struct ElfHeader {
    pub file_type: u16,
    pub entry: u32,
    pub phoff: u32,
    pub shoff: u32,
    pub phnum: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl ElfHeader {
    pub fn relocatable() -> Self {
        Self {
            file_type: ET_REL,
            entry: 0,
            phoff: 0,
            shoff: 0,
            phnum: 0,
            shnum: 0,
            shstrndx: 0,
        }
    }

    pub fn executable() -> Self {
        Self {
            file_type: ET_EXEC,
            entry: 0,
            phoff: EHDR_SIZE as u32,
            phnum: 1,
            shoff: 0,
            shnum: 0,
            shstrndx: 0,
        }
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        buf.extend_from_slice(&self.file_type.to_le_bytes());
        buf.extend_from_slice(&EM_386.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes()); // version
        buf.extend_from_slice(&self.entry.to_le_bytes());
        buf.extend_from_slice(&self.phoff.to_le_bytes());
        buf.extend_from_slice(&self.shoff.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // flags
        buf.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
        let phentsize = if self.phnum > 0 { PHDR_SIZE as u16 } else { 0 };
        buf.extend_from_slice(&phentsize.to_le_bytes());
        buf.extend_from_slice(&self.phnum.to_le_bytes());
        let shentsize = if self.shnum > 0 || self.shoff > 0 {
            SHDR_SIZE as u16
        } else {
            0
        };
        buf.extend_from_slice(&shentsize.to_le_bytes());
        buf.extend_from_slice(&self.shnum.to_le_bytes());
        buf.extend_from_slice(&self.shstrndx.to_le_bytes());
    }

    pub fn parse(data: &[u8]) -> Result<Self, String> {
        if data.len() < EHDR_SIZE {
            return Err("file is shorter than an ELF header".to_string());
        }

        if data[..4] != [0x7f, b'E', b'L', b'F'] {
            return Err("bad ELF magic".to_string());
        }

        Ok(Self {
            file_type: read_u16(data, 16),
            entry: read_u32(data, 24),
            phoff: read_u32(data, 28),
            shoff: read_u32(data, 32),
            phnum: read_u16(data, 44),
            shnum: read_u16(data, 48),
            shstrndx: read_u16(data, 50),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub offset: u32,
    pub vaddr: u32,
    pub paddr: u32,
    pub filesz: u32,
    pub memsz: u32,
    pub flags: u32,
    pub align: u32,
}

impl ProgramHeader {
    /// The single RX segment every executable carries: the whole file,
    /// mapped at the fixed base. Sizes are patched once the image is
    /// complete.
    pub fn load_segment() -> Self {
        Self {
            p_type: PT_LOAD,
            offset: 0,
            vaddr: LOAD_BASE,
            paddr: LOAD_BASE,
            filesz: 0,
            memsz: 0,
            flags: PF_R | PF_X,
            align: 0x1000,
        }
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.p_type.to_le_bytes());
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.vaddr.to_le_bytes());
        buf.extend_from_slice(&self.paddr.to_le_bytes());
        buf.extend_from_slice(&self.filesz.to_le_bytes());
        buf.extend_from_slice(&self.memsz.to_le_bytes());
        buf.extend_from_slice(&self.flags.to_le_bytes());
        buf.extend_from_slice(&self.align.to_le_bytes());
    }
}

#[derive(Debug, Clone, Default)]
pub struct SectionHeader {
    pub name: u32,
    pub sh_type: u32,
    pub flags: u32,
    pub addr: u32,
    pub offset: u32,
    pub size: u32,
    pub link: u32,
    pub info: u32,
    pub addralign: u32,
    pub entsize: u32,
}

impl SectionHeader {
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.name.to_le_bytes());
        buf.extend_from_slice(&self.sh_type.to_le_bytes());
        buf.extend_from_slice(&self.flags.to_le_bytes());
        buf.extend_from_slice(&self.addr.to_le_bytes());
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&self.link.to_le_bytes());
        buf.extend_from_slice(&self.info.to_le_bytes());
        buf.extend_from_slice(&self.addralign.to_le_bytes());
        buf.extend_from_slice(&self.entsize.to_le_bytes());
    }

    pub fn parse(data: &[u8], offset: usize) -> Result<Self, String> {
        if data.len() < offset + SHDR_SIZE {
            return Err("section header runs past the end of the file".to_string());
        }

        Ok(Self {
            name: read_u32(data, offset),
            sh_type: read_u32(data, offset + 4),
            flags: read_u32(data, offset + 8),
            addr: read_u32(data, offset + 12),
            offset: read_u32(data, offset + 16),
            size: read_u32(data, offset + 20),
            link: read_u32(data, offset + 24),
            info: read_u32(data, offset + 28),
            addralign: read_u32(data, offset + 32),
            entsize: read_u32(data, offset + 36),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub name: u32,
    pub value: u32,
    pub size: u32,
    pub info: u8,
    pub other: u8,
    pub shndx: u16,
}

impl SymbolEntry {
    pub fn null() -> Self {
        Self {
            name: 0,
            value: 0,
            size: 0,
            info: 0,
            other: 0,
            shndx: SHN_UNDEF,
        }
    }

    pub fn to_info(binding: u8, sym_type: u8) -> u8 {
        (binding << 4) | (sym_type & 0xf)
    }

    pub fn binding(&self) -> u8 {
        self.info >> 4
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.name.to_le_bytes());
        buf.extend_from_slice(&self.value.to_le_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.push(self.info);
        buf.push(self.other);
        buf.extend_from_slice(&self.shndx.to_le_bytes());
    }

    pub fn parse(data: &[u8], offset: usize) -> Result<Self, String> {
        if data.len() < offset + SYM_SIZE {
            return Err("symbol entry runs past the end of the file".to_string());
        }

        Ok(Self {
            name: read_u32(data, offset),
            value: read_u32(data, offset + 4),
            size: read_u32(data, offset + 8),
            info: data[offset + 12],
            other: data[offset + 13],
            shndx: read_u16(data, offset + 14),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelocationEntry {
    pub offset: u32,
    pub info: u32,
}

impl RelocationEntry {
    pub fn new(offset: u32, sym_index: u32, kind: u8) -> Self {
        Self {
            offset,
            info: (sym_index << 8) | kind as u32,
        }
    }

    pub fn sym_index(&self) -> u32 {
        self.info >> 8
    }

    pub fn kind(&self) -> u8 {
        self.info as u8
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.info.to_le_bytes());
    }

    pub fn parse(data: &[u8], offset: usize) -> Result<Self, String> {
        if data.len() < offset + REL_SIZE {
            return Err("relocation entry runs past the end of the file".to_string());
        }

        Ok(Self {
            offset: read_u32(data, offset),
            info: read_u32(data, offset + 4),
        })
    }
}

pub fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

pub fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

pub fn write_u32_at(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn write_u16_at(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Zero-pads `buf` until its length is a multiple of `align`.
pub fn pad_to_alignment(buf: &mut Vec<u8>, align: usize) {
    while buf.len() % align != 0 {
        buf.push(0);
    }
}

/// Reads the NUL-terminated string at `offset` inside a string table.
pub fn string_at(strtab: &[u8], offset: usize) -> &str {
    let end = strtab[offset..]
        .iter()
        .position(|&b| b == 0)
        .map(|i| offset + i)
        .unwrap_or(strtab.len());

    std::str::from_utf8(&strtab[offset..end]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elf_header_round_trips() {
        let mut header = ElfHeader::executable();
        header.entry = LOAD_BASE + 0x54;

        let mut buf = Vec::new();
        header.write(&mut buf);
        assert_eq!(buf.len(), EHDR_SIZE);

        let parsed = ElfHeader::parse(&buf).unwrap();
        assert_eq!(parsed.file_type, ET_EXEC);
        assert_eq!(parsed.entry, LOAD_BASE + 0x54);
        assert_eq!(parsed.phoff, EHDR_SIZE as u32);
        assert_eq!(parsed.phnum, 1);
    }

    #[test]
    fn header_magic_is_checked() {
        assert!(ElfHeader::parse(&[0u8; EHDR_SIZE]).is_err());
        assert!(ElfHeader::parse(&[0x7f, b'E', b'L']).is_err());
    }

    #[test]
    fn section_and_symbol_records_round_trip() {
        let section = SectionHeader {
            name: 1,
            sh_type: SHT_PROGBITS,
            flags: SHF_ALLOC | SHF_EXECINSTR,
            offset: 0x140,
            size: 0x2c,
            addralign: 16,
            ..Default::default()
        };

        let mut buf = Vec::new();
        section.write(&mut buf);
        assert_eq!(buf.len(), SHDR_SIZE);

        let parsed = SectionHeader::parse(&buf, 0).unwrap();
        assert_eq!(parsed.sh_type, SHT_PROGBITS);
        assert_eq!(parsed.offset, 0x140);
        assert_eq!(parsed.size, 0x2c);

        let symbol = SymbolEntry {
            name: 7,
            value: 0x10,
            size: 0,
            info: SymbolEntry::to_info(STB_GLOBAL, STT_NOTYPE),
            other: 0,
            shndx: 1,
        };

        let mut buf = Vec::new();
        symbol.write(&mut buf);
        assert_eq!(buf.len(), SYM_SIZE);

        let parsed = SymbolEntry::parse(&buf, 0).unwrap();
        assert_eq!(parsed.binding(), STB_GLOBAL);
        assert_eq!(parsed.value, 0x10);
        assert_eq!(parsed.shndx, 1);
    }

    #[test]
    fn relocation_info_packs_symbol_and_kind() {
        let reloc = RelocationEntry::new(0x24, 5, R_386_PC32);

        assert_eq!(reloc.sym_index(), 5);
        assert_eq!(reloc.kind(), R_386_PC32);

        let mut buf = Vec::new();
        reloc.write(&mut buf);
        let parsed = RelocationEntry::parse(&buf, 0).unwrap();
        assert_eq!(parsed.offset, 0x24);
        assert_eq!(parsed.info, reloc.info);
    }

    #[test]
    fn string_table_lookups_stop_at_the_terminator() {
        let strtab = b"\0main.silt\0_start\0";

        assert_eq!(string_at(strtab, 1), "main.silt");
        assert_eq!(string_at(strtab, 11), "_start");
        assert_eq!(string_at(strtab, 0), "");
    }

    #[test]
    fn padding_reaches_the_next_boundary() {
        let mut buf = vec![1, 2, 3];
        pad_to_alignment(&mut buf, 4);
        assert_eq!(buf.len(), 4);

        pad_to_alignment(&mut buf, 4);
        assert_eq!(buf.len(), 4);

        buf.push(9);
        pad_to_alignment(&mut buf, 16);
        assert_eq!(buf.len(), 16);
    }
}
