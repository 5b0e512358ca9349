//! Static linker: relocatable objects in, ELF32 executable out.
//!
//! The `.text` sections are concatenated in input order, every
//! PC-relative relocation is resolved against the merged global symbol
//! table, and the result is wrapped in an executable image with a
//! single RX segment mapping the whole file. Load addresses cancel out
//! of PC-relative arithmetic, so patching works purely in text offsets.
//!
//! Symbol problems (undefined, doubly defined, no entry point) are
//! collected into one error so a bad link reports everything at once.
//! Structural problems in the objects themselves panic: this linker
//! only consumes objects the assembler just produced.

use hashbrown::HashMap;
use itertools::Itertools;

use crate::backend::elf::{
    EHDR_SIZE, ElfHeader, LOAD_BASE, PHDR_SIZE, ProgramHeader, R_386_PC32, REL_SIZE,
    RelocationEntry, SHDR_SIZE, SHN_UNDEF, STB_GLOBAL, SYM_SIZE, SectionHeader, SymbolEntry,
    string_at, write_u32_at,
};

const ENTRY_SYMBOL: &str = "_start";

/// File offset the merged text lands at: headers map below it in the
/// same segment.
const TEXT_OFFSET: u32 = (EHDR_SIZE + PHDR_SIZE) as u32;

pub struct ObjectFile {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct LinkError {
    pub messages: Vec<String>,
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.messages.iter().join("\n"))
    }
}

impl std::error::Error for LinkError {}

struct Module {
    name: String,
    text: Vec<u8>,
    /// Every symtab entry, index-aligned with relocation references.
    symbols: Vec<(String, SymbolEntry)>,
    relocations: Vec<RelocationEntry>,
    /// This module's text within the merged image.
    offset: u32,
}

pub fn link(objects: &[ObjectFile]) -> Result<Vec<u8>, LinkError> {
    let mut errors = Vec::new();

    let mut modules = Vec::new();
    for object in objects {
        match parse_module(&object.name, &object.data) {
            Ok(module) => modules.push(module),
            Err(message) => errors.push(message),
        }
    }

    // Lay the modules out before resolving, since a definition's final
    // address depends on where its module landed.
    let mut text = Vec::new();
    for module in &mut modules {
        module.offset = text.len() as u32;
        text.extend_from_slice(&module.text);
    }

    let definitions = collect_definitions(&modules, &mut errors);

    for module in &modules {
        for relocation in &module.relocations {
            if relocation.kind() != R_386_PC32 {
                panic!(
                    "unsupported relocation kind {} in `{}`",
                    relocation.kind(),
                    module.name
                );
            }

            let (name, _) = &module.symbols[relocation.sym_index() as usize];
            let Some(&address) = definitions.get(name.as_str()) else {
                errors.push(format!(
                    "undefined symbol `{name}` referenced from `{}`",
                    module.name
                ));
                continue;
            };

            let site = module.offset + relocation.offset;
            let patched = address.wrapping_sub(site + 4);
            write_u32_at(&mut text, site as usize, patched);
        }
    }

    let entry = match definitions.get(ENTRY_SYMBOL) {
        Some(&address) => LOAD_BASE + TEXT_OFFSET + address,
        None => {
            errors.push(format!("no module defines the entry symbol `{ENTRY_SYMBOL}`"));
            0
        }
    };

    if !errors.is_empty() {
        return Err(LinkError { messages: errors });
    }

    Ok(write_executable(entry, &text))
}

/// Merged symbol table: name to text offset within the merged image.
fn collect_definitions(modules: &[Module], errors: &mut Vec<String>) -> HashMap<String, u32> {
    let mut definitions: HashMap<String, u32> = HashMap::new();
    let mut defined_in: HashMap<String, &str> = HashMap::new();

    for module in modules {
        for (name, symbol) in &module.symbols {
            if symbol.binding() != STB_GLOBAL || symbol.shndx == SHN_UNDEF {
                continue;
            }

            if let Some(first) = defined_in.get(name.as_str()) {
                errors.push(format!(
                    "symbol `{name}` is defined in both `{first}` and `{}`",
                    module.name
                ));
                continue;
            }

            definitions.insert(name.clone(), module.offset + symbol.value);
            defined_in.insert(name.clone(), &module.name);
        }
    }

    definitions
}

fn parse_module(name: &str, data: &[u8]) -> Result<Module, String> {
    let header =
        ElfHeader::parse(data).map_err(|message| format!("cannot link `{name}`: {message}"))?;

    let mut sections = Vec::new();
    for index in 0..header.shnum as usize {
        let section = SectionHeader::parse(data, header.shoff as usize + index * SHDR_SIZE)
            .map_err(|message| format!("cannot link `{name}`: {message}"))?;
        sections.push(section);
    }

    let shstrtab = section_body(data, &sections[header.shstrndx as usize]);
    let find = |wanted: &str| {
        sections
            .iter()
            .find(|section| string_at(shstrtab, section.name as usize) == wanted)
    };

    let Some(text_header) = find(".text") else {
        panic!("object `{name}` has no .text section");
    };
    let text = section_body(data, text_header).to_vec();

    let mut symbols = Vec::new();
    if let (Some(symtab_header), Some(strtab_header)) = (find(".symtab"), find(".strtab")) {
        let symtab = section_body(data, symtab_header);
        let strtab = section_body(data, strtab_header);

        for index in 0..symtab.len() / SYM_SIZE {
            let symbol = SymbolEntry::parse(symtab, index * SYM_SIZE)
                .map_err(|message| format!("cannot link `{name}`: {message}"))?;
            let symbol_name = string_at(strtab, symbol.name as usize).to_string();
            symbols.push((symbol_name, symbol));
        }
    }

    let mut relocations = Vec::new();
    if let Some(rel_header) = find(".rel.text") {
        let rel = section_body(data, rel_header);

        for index in 0..rel.len() / REL_SIZE {
            let relocation = RelocationEntry::parse(rel, index * REL_SIZE)
                .map_err(|message| format!("cannot link `{name}`: {message}"))?;
            relocations.push(relocation);
        }
    }

    Ok(Module {
        name: name.to_string(),
        text,
        symbols,
        relocations,
        offset: 0,
    })
}

fn section_body<'data>(data: &'data [u8], header: &SectionHeader) -> &'data [u8] {
    &data[header.offset as usize..(header.offset + header.size) as usize]
}

fn write_executable(entry: u32, text: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();

    let mut header = ElfHeader::executable();
    header.entry = entry;
    header.write(&mut buf);

    ProgramHeader::load_segment().write(&mut buf);
    buf.extend_from_slice(text);

    // The segment spans the whole file; its sizes are only known now.
    let total = buf.len() as u32;
    write_u32_at(&mut buf, EHDR_SIZE + 16, total);
    write_u32_at(&mut buf, EHDR_SIZE + 20, total);

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{assembler::assemble, elf::{ET_EXEC, PT_LOAD, read_u32}},
        diagnostics::Diagnostics,
    };

    fn object(name: &str, source: &str) -> ObjectFile {
        let mut diagnostics = Diagnostics::new();
        let data = assemble(source, name, &mut diagnostics).expect("test listing must assemble");
        ObjectFile {
            name: name.to_string(),
            data,
        }
    }

    #[test]
    fn a_single_module_links_into_an_executable() {
        let image = link(&[object("main.silt", "_start:\nmov eax, 1\nint 0x80")]).unwrap();

        let header = ElfHeader::parse(&image).unwrap();
        assert_eq!(header.file_type, ET_EXEC);
        assert_eq!(header.phnum, 1);
        assert_eq!(header.entry, LOAD_BASE + TEXT_OFFSET);

        // mov eax, 1 begins the merged text
        assert_eq!(image[TEXT_OFFSET as usize], 0xB8);
    }

    #[test]
    fn the_load_segment_covers_the_whole_file() {
        let image = link(&[object("main.silt", "_start:\nret")]).unwrap();

        let p_type = read_u32(&image, EHDR_SIZE);
        let filesz = read_u32(&image, EHDR_SIZE + 16);
        let memsz = read_u32(&image, EHDR_SIZE + 20);
        let vaddr = read_u32(&image, EHDR_SIZE + 8);

        assert_eq!(p_type, PT_LOAD);
        assert_eq!(filesz, image.len() as u32);
        assert_eq!(memsz, filesz);
        assert_eq!(vaddr, LOAD_BASE);
    }

    #[test]
    fn cross_module_calls_are_patched_relative_to_the_call_site() {
        let caller = object("main.silt", "_start:\ncall f\nmov eax, 1\nint 0x80");
        let callee = object("lib.silt", "f:\nret");
        let image = link(&[caller, callee]).unwrap();

        // caller text is 12 bytes, so f lands at merged offset 12; the
        // call field sits at offset 1 and the next instruction at 5.
        let field = TEXT_OFFSET as usize + 1;
        assert_eq!(read_u32(&image, field), 7);
        assert_eq!(image[TEXT_OFFSET as usize + 12], 0xC3);
    }

    #[test]
    fn the_entry_point_tracks_its_module_offset() {
        let lib = object("lib.silt", "f:\nret");
        let main = object("main.silt", "_start:\ncall f\nmov eax, 1\nint 0x80");
        let image = link(&[lib, main]).unwrap();

        let header = ElfHeader::parse(&image).unwrap();
        assert_eq!(header.entry, LOAD_BASE + TEXT_OFFSET + 1);
    }

    #[test]
    fn undefined_symbols_fail_the_link_by_name() {
        let error = link(&[object("main.silt", "_start:\ncall missing\nret")]).unwrap_err();

        assert!(error.messages.iter().any(|m| m.contains("`missing`")));
        assert!(error.to_string().contains("main.silt"));
    }

    #[test]
    fn all_symbol_problems_are_reported_together() {
        let first = object("a.silt", "f:\nret");
        let second = object("b.silt", "f:\ncall g\nret");
        let error = link(&[first, second]).unwrap_err();

        assert!(error.messages.iter().any(|m| m.contains("`f`")));
        assert!(error.messages.iter().any(|m| m.contains("`g`")));
        assert!(error.messages.iter().any(|m| m.contains(ENTRY_SYMBOL)));
    }

    #[test]
    fn a_missing_entry_symbol_fails_the_link() {
        let error = link(&[object("lib.silt", "f:\nret")]).unwrap_err();
        assert!(error.to_string().contains("_start"));
    }
}
