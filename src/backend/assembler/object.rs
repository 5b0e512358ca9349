//! Relocatable object emission.
//!
//! The file layout is fixed: ELF header, six section headers, then the
//! section bodies in header order. The headers go out first with zeroed
//! offsets and sizes, and each body patches its own header as it lands.
//! Objects without relocations report five sections; the `.rel.text`
//! header slot is written either way so the body layout never shifts.
//!
//! Every label the encoder saw becomes a global symbol: defined ones
//! carry their `.text` offset, undefined ones stay `SHN_UNDEF` for the
//! linker to match against other objects.

use hashbrown::HashMap;

use crate::backend::{
    assembler::encoder::Assembly,
    elf::{
        EHDR_SIZE, ElfHeader, R_386_PC32, REL_SIZE, RelocationEntry, SHDR_SIZE, SHF_ALLOC,
        SHF_EXECINSTR, SHN_ABS, SHN_UNDEF, SHT_PROGBITS, SHT_REL, SHT_STRTAB, SHT_SYMTAB,
        STB_GLOBAL, STB_LOCAL, STT_FILE, STT_NOTYPE, STT_SECTION, SYM_SIZE, SectionHeader,
        SymbolEntry, pad_to_alignment, write_u32_at,
    },
};

/// `.shstrtab` body; the name offsets below index into it.
const SHSTRTAB: &[u8] = b"\0.text\0.shstrtab\0.symtab\0.strtab\0.rel.text\0";
const NAME_TEXT: u32 = 1;
const NAME_SHSTRTAB: u32 = 7;
const NAME_SYMTAB: u32 = 17;
const NAME_STRTAB: u32 = 25;
const NAME_REL_TEXT: u32 = 33;

const TEXT_INDEX: usize = 1;
const SHSTRTAB_INDEX: usize = 2;
const SYMTAB_INDEX: usize = 3;
const STRTAB_INDEX: usize = 4;
const REL_TEXT_INDEX: usize = 5;

/// Symbols before the first label: null, the `.text` section, the file.
const LOCAL_SYMBOL_COUNT: u32 = 3;

pub fn write_object(assembly: &Assembly, source_name: &str) -> Vec<u8> {
    let (symtab, strtab, symbol_indices) = build_symbol_tables(assembly, source_name);

    let mut rel = Vec::new();
    for site in &assembly.relocations {
        RelocationEntry::new(site.offset, symbol_indices[&site.label], R_386_PC32).write(&mut rel);
    }

    let mut buf = Vec::new();

    let mut header = ElfHeader::relocatable();
    header.shoff = EHDR_SIZE as u32;
    header.shstrndx = SHSTRTAB_INDEX as u16;
    header.shnum = if rel.is_empty() { 5 } else { 6 };
    header.write(&mut buf);

    let shdr_table = buf.len();
    for section in section_headers() {
        section.write(&mut buf);
    }

    append_section(&mut buf, shdr_table, TEXT_INDEX, 16, &assembly.code);
    append_section(&mut buf, shdr_table, SHSTRTAB_INDEX, 1, SHSTRTAB);
    append_section(&mut buf, shdr_table, SYMTAB_INDEX, 4, &symtab);
    append_section(&mut buf, shdr_table, STRTAB_INDEX, 1, &strtab);
    append_section(&mut buf, shdr_table, REL_TEXT_INDEX, 4, &rel);

    buf
}

fn section_headers() -> [SectionHeader; 6] {
    [
        SectionHeader::default(),
        SectionHeader {
            name: NAME_TEXT,
            sh_type: SHT_PROGBITS,
            flags: SHF_ALLOC | SHF_EXECINSTR,
            addralign: 16,
            ..Default::default()
        },
        SectionHeader {
            name: NAME_SHSTRTAB,
            sh_type: SHT_STRTAB,
            addralign: 1,
            ..Default::default()
        },
        SectionHeader {
            name: NAME_SYMTAB,
            sh_type: SHT_SYMTAB,
            link: STRTAB_INDEX as u32,
            info: LOCAL_SYMBOL_COUNT,
            addralign: 4,
            entsize: SYM_SIZE as u32,
            ..Default::default()
        },
        SectionHeader {
            name: NAME_STRTAB,
            sh_type: SHT_STRTAB,
            addralign: 1,
            ..Default::default()
        },
        SectionHeader {
            name: NAME_REL_TEXT,
            sh_type: SHT_REL,
            link: SYMTAB_INDEX as u32,
            info: TEXT_INDEX as u32,
            addralign: 4,
            entsize: REL_SIZE as u32,
            ..Default::default()
        },
    ]
}

/// Pads to the section's alignment, appends the body, and patches the
/// offset and size fields of header `index` in place.
fn append_section(buf: &mut Vec<u8>, shdr_table: usize, index: usize, align: usize, body: &[u8]) {
    pad_to_alignment(buf, align);
    let offset = buf.len() as u32;
    buf.extend_from_slice(body);

    let header = shdr_table + index * SHDR_SIZE;
    write_u32_at(buf, header + 16, offset);
    write_u32_at(buf, header + 20, body.len() as u32);
}

fn build_symbol_tables(
    assembly: &Assembly,
    source_name: &str,
) -> (Vec<u8>, Vec<u8>, HashMap<String, u32>) {
    let mut strtab = vec![0u8];
    let mut symtab = Vec::new();

    SymbolEntry::null().write(&mut symtab);

    SymbolEntry {
        name: 0,
        value: 0,
        size: 0,
        info: SymbolEntry::to_info(STB_LOCAL, STT_SECTION),
        other: 0,
        shndx: TEXT_INDEX as u16,
    }
    .write(&mut symtab);

    let file_name = strtab.len() as u32;
    strtab.extend_from_slice(source_name.as_bytes());
    strtab.push(0);

    SymbolEntry {
        name: file_name,
        value: 0,
        size: 0,
        info: SymbolEntry::to_info(STB_LOCAL, STT_FILE),
        other: 0,
        shndx: SHN_ABS,
    }
    .write(&mut symtab);

    // Labels arrive name-sorted from the encoder, so symbol order is
    // deterministic across runs.
    let mut symbol_indices = HashMap::new();
    for (position, (label, address)) in assembly.symbols.iter().enumerate() {
        let name = strtab.len() as u32;
        strtab.extend_from_slice(label.as_bytes());
        strtab.push(0);

        let (value, shndx) = match address {
            Some(address) => (*address, TEXT_INDEX as u16),
            None => (0, SHN_UNDEF),
        };

        SymbolEntry {
            name,
            value,
            size: 0,
            info: SymbolEntry::to_info(STB_GLOBAL, STT_NOTYPE),
            other: 0,
            shndx,
        }
        .write(&mut symtab);

        symbol_indices.insert(label.clone(), LOCAL_SYMBOL_COUNT + position as u32);
    }

    (symtab, strtab, symbol_indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{
            assembler::{encoder::Encoder, parser::Parser},
            elf::{ET_REL, string_at},
        },
        diagnostics::Diagnostics,
    };

    fn object_for(source: &str) -> Vec<u8> {
        let mut diagnostics = Diagnostics::new();
        let statements = Parser::parse(source, &mut diagnostics);
        let assembly = Encoder::encode(&statements, &mut diagnostics);
        assert!(!diagnostics.has_errors());
        write_object(&assembly, "unit.silt")
    }

    fn section(data: &[u8], index: usize) -> SectionHeader {
        let header = ElfHeader::parse(data).unwrap();
        SectionHeader::parse(data, header.shoff as usize + index * SHDR_SIZE).unwrap()
    }

    fn section_body<'a>(data: &'a [u8], index: usize) -> &'a [u8] {
        let header = section(data, index);
        &data[header.offset as usize..(header.offset + header.size) as usize]
    }

    #[test]
    fn the_header_describes_a_five_section_relocatable() {
        let data = object_for("_start:\nmov eax, 1\nint 0x80");
        let header = ElfHeader::parse(&data).unwrap();

        assert_eq!(header.file_type, ET_REL);
        assert_eq!(header.shoff, EHDR_SIZE as u32);
        assert_eq!(header.shnum, 5);
        assert_eq!(header.shstrndx, 2);
    }

    #[test]
    fn relocations_raise_the_section_count_to_six() {
        let data = object_for("call elsewhere\nret");
        let header = ElfHeader::parse(&data).unwrap();
        assert_eq!(header.shnum, 6);
    }

    #[test]
    fn section_names_resolve_through_the_shstrtab() {
        let data = object_for("ret");
        let shstrtab = section_body(&data, SHSTRTAB_INDEX);

        assert_eq!(string_at(shstrtab, section(&data, TEXT_INDEX).name as usize), ".text");
        assert_eq!(
            string_at(shstrtab, section(&data, SYMTAB_INDEX).name as usize),
            ".symtab"
        );
        assert_eq!(
            string_at(shstrtab, section(&data, REL_TEXT_INDEX).name as usize),
            ".rel.text"
        );
    }

    #[test]
    fn the_text_body_is_the_encoded_code_at_its_alignment() {
        let data = object_for("mov eax, ecx\nret");
        let header = section(&data, TEXT_INDEX);

        assert_eq!(header.offset % 16, 0);
        assert_eq!(section_body(&data, TEXT_INDEX), &[0x89, 0xC8, 0xC3]);
    }

    #[test]
    fn defined_labels_become_global_symbols_with_their_offsets() {
        let data = object_for("ret\nf:\nret");
        let symtab = section_body(&data, SYMTAB_INDEX);
        let strtab = section_body(&data, STRTAB_INDEX);

        assert_eq!(symtab.len(), 4 * SYM_SIZE);

        let file = SymbolEntry::parse(symtab, 2 * SYM_SIZE).unwrap();
        assert_eq!(file.shndx, SHN_ABS);
        assert_eq!(string_at(strtab, file.name as usize), "unit.silt");

        let f = SymbolEntry::parse(symtab, 3 * SYM_SIZE).unwrap();
        assert_eq!(f.binding(), STB_GLOBAL);
        assert_eq!(f.value, 1);
        assert_eq!(f.shndx, TEXT_INDEX as u16);
        assert_eq!(string_at(strtab, f.name as usize), "f");
    }

    #[test]
    fn undefined_labels_produce_relocations_against_undef_symbols() {
        let data = object_for("f:\ncall g\nret");
        let symtab = section_body(&data, SYMTAB_INDEX);
        let strtab = section_body(&data, STRTAB_INDEX);
        let rel = section_body(&data, REL_TEXT_INDEX);

        assert_eq!(rel.len(), REL_SIZE);
        let entry = RelocationEntry::parse(rel, 0).unwrap();
        assert_eq!(entry.offset, 1);
        assert_eq!(entry.kind(), R_386_PC32);

        let symbol =
            SymbolEntry::parse(symtab, entry.sym_index() as usize * SYM_SIZE).unwrap();
        assert_eq!(symbol.shndx, SHN_UNDEF);
        assert_eq!(string_at(strtab, symbol.name as usize), "g");
    }

    #[test]
    fn the_symtab_header_counts_its_locals() {
        let data = object_for("ret");
        let header = section(&data, SYMTAB_INDEX);

        assert_eq!(header.sh_type, SHT_SYMTAB);
        assert_eq!(header.link, STRTAB_INDEX as u32);
        assert_eq!(header.info, LOCAL_SYMBOL_COUNT);
        assert_eq!(header.entsize, SYM_SIZE as u32);
    }
}
