//! Statement list to machine code bytes.
//!
//! Encoding is a single forward pass. Label references are written as
//! placeholders and remembered per label; once every statement has been
//! encoded, a patch pass resolves them. A relative placeholder holds the
//! address of the following instruction, so the patched value is simply
//! the label address minus the placeholder. Absolute references get the
//! label address plus the `org` base.
//!
//! A label that is referenced relatively but never defined is not an
//! error: the reference becomes a relocation against an external symbol
//! and the linker finishes the job. An absolute reference to an
//! undefined label cannot be deferred that way and is reported.

use std::collections::BTreeMap;

use crate::{
    backend::assembler::parser::{Expr, Mnemonic, Operand, Register, Statement, StatementKind},
    diagnostics::Diagnostics,
};

/// One unit's encoded text, ready for the object writer.
#[derive(Debug)]
pub struct Assembly {
    pub code: Vec<u8>,
    /// Every label, name-sorted. A defined label maps to its offset
    /// within `code`; an undefined one maps to `None` and is external.
    pub symbols: BTreeMap<String, Option<u32>>,
    pub relocations: Vec<RelocationSite>,
}

/// A relative reference left for the linker to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationSite {
    /// Offset of the 4-byte field within the code.
    pub offset: u32,
    pub label: String,
}

#[derive(Debug, Default)]
struct LabelState {
    address: Option<u32>,
    /// Sites holding a next-instruction placeholder to subtract.
    rel_sites: Vec<usize>,
    /// Sites wanting the label's load address.
    abs_sites: Vec<usize>,
    first_use_line: Option<usize>,
}

pub struct Encoder<'diag> {
    code: Vec<u8>,
    labels: BTreeMap<String, LabelState>,
    load_base: u32,
    diagnostics: &'diag mut Diagnostics,
}

fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
    (mode << 6) | (reg << 3) | rm
}

impl<'diag> Encoder<'diag> {
    pub fn encode(statements: &[Statement], diagnostics: &mut Diagnostics) -> Assembly {
        let mut encoder = Encoder {
            code: Vec::new(),
            labels: BTreeMap::new(),
            load_base: 0,
            diagnostics,
        };

        for statement in statements {
            match &statement.kind {
                StatementKind::LabelDef(name) => encoder.define_label(name, statement.line),
                StatementKind::Instruction {
                    mnemonic,
                    left,
                    right,
                } => encoder.encode_instruction(*mnemonic, left, right, statement.line),
            }
        }

        encoder.patch_label_references()
    }

    fn define_label(&mut self, name: &str, line: usize) {
        let address = self.code.len() as u32;
        let state = self.labels.entry(name.to_string()).or_default();

        if state.address.is_some() {
            self.diagnostics
                .report(line, format!("label `{name}` is defined twice"));
            return;
        }
        state.address = Some(address);
    }

    /// Emits a 4-byte field referring to `name` relative to the next
    /// instruction. The placeholder is the next-instruction address so
    /// patching can subtract it without re-decoding the instruction.
    fn emit_rel_reference(&mut self, name: &str, line: usize) {
        let site = self.code.len();
        self.emit_u32((site + 4) as u32);

        let state = self.labels.entry(name.to_string()).or_default();
        state.rel_sites.push(site);
        state.first_use_line.get_or_insert(line);
    }

    fn emit_abs_reference(&mut self, name: &str, line: usize) {
        let site = self.code.len();
        self.emit_u32(0);

        let state = self.labels.entry(name.to_string()).or_default();
        state.abs_sites.push(site);
        state.first_use_line.get_or_insert(line);
    }

    fn patch_label_references(mut self) -> Assembly {
        let mut symbols = BTreeMap::new();
        let mut relocations = Vec::new();

        for (name, state) in &self.labels {
            match state.address {
                Some(address) => {
                    for &site in &state.rel_sites {
                        let placeholder = read_u32(&self.code, site);
                        let patched = address.wrapping_sub(placeholder);
                        write_u32(&mut self.code, site, patched);
                    }
                    for &site in &state.abs_sites {
                        write_u32(&mut self.code, site, address.wrapping_add(self.load_base));
                    }
                    symbols.insert(name.clone(), Some(address));
                }
                None => {
                    if !state.abs_sites.is_empty() {
                        self.diagnostics.report(
                            state.first_use_line.unwrap_or(1),
                            format!("label `{name}` is used but never defined"),
                        );
                        continue;
                    }

                    for &site in &state.rel_sites {
                        relocations.push(RelocationSite {
                            offset: site as u32,
                            label: name.clone(),
                        });
                    }
                    symbols.insert(name.clone(), None);
                }
            }
        }

        relocations.sort_by_key(|site| site.offset);

        Assembly {
            code: self.code,
            symbols,
            relocations,
        }
    }

    fn emit(&mut self, byte: u8) {
        self.code.push(byte);
    }

    fn emit_u32(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    fn emit_i32(&mut self, value: i32) {
        self.emit_u32(value as u32);
    }

    /// `[ebp + d]` is the only addressing form the target needs; the
    /// displacement must fit in a signed byte.
    fn check_memory(&mut self, base: Register, displacement: &Option<Expr>, line: usize) -> i8 {
        if base != Register::Ebp {
            self.diagnostics.report(
                line,
                format!("memory operands must be `ebp`-based, found `{base}`"),
            );
            return 0;
        }

        let value = displacement.as_ref().map(Expr::eval).unwrap_or(0);
        match i8::try_from(value) {
            Ok(value) => value,
            Err(_) => {
                self.diagnostics.report(
                    line,
                    format!("displacement {value} does not fit in a signed byte"),
                );
                0
            }
        }
    }

    fn report_operands(&mut self, mnemonic: Mnemonic, line: usize) {
        self.diagnostics.report(
            line,
            format!("unsupported operand combination for `{mnemonic}`"),
        );
    }

    fn encode_instruction(
        &mut self,
        mnemonic: Mnemonic,
        left: &Option<Operand>,
        right: &Option<Operand>,
        line: usize,
    ) {
        use Mnemonic as M;
        use Operand as O;

        match (mnemonic, left, right) {
            (M::Org, Some(O::Expr(expr)), None) => {
                self.load_base = expr.eval() as u32;
            }

            (M::Mov, Some(O::Register(dst)), Some(O::Register(src))) => {
                self.emit(0x89);
                self.emit(modrm(0b11, src.index(), dst.index()));
            }
            (M::Mov, Some(O::Register(dst)), Some(O::Expr(expr))) => {
                self.emit(0xB8 + dst.index());
                self.emit_i32(expr.eval());
            }
            (M::Mov, Some(O::Register(dst)), Some(O::Label(name))) => {
                self.emit(0xB8 + dst.index());
                let name = name.clone();
                self.emit_abs_reference(&name, line);
            }
            (M::Mov, Some(O::Memory { base, displacement }), Some(O::Register(src))) => {
                let displacement = self.check_memory(*base, displacement, line);
                self.emit(0x89);
                self.emit(modrm(0b01, src.index(), Register::Ebp.index()));
                self.emit(displacement as u8);
            }
            (M::Mov, Some(O::Register(dst)), Some(O::Memory { base, displacement })) => {
                let displacement = self.check_memory(*base, displacement, line);
                self.emit(0x8B);
                self.emit(modrm(0b01, dst.index(), Register::Ebp.index()));
                self.emit(displacement as u8);
            }

            (M::Add, Some(O::Register(dst)), Some(O::Register(src))) => {
                self.emit(0x01);
                self.emit(modrm(0b11, src.index(), dst.index()));
            }
            (M::Add, Some(O::Register(Register::Eax)), Some(O::Expr(expr))) => {
                self.emit(0x05);
                self.emit_i32(expr.eval());
            }
            (M::Add, Some(O::Register(dst)), Some(O::Expr(expr))) => {
                self.emit(0x81);
                self.emit(modrm(0b11, 0, dst.index()));
                self.emit_i32(expr.eval());
            }

            (M::Sub, Some(O::Register(dst)), Some(O::Register(src))) => {
                self.emit(0x29);
                self.emit(modrm(0b11, src.index(), dst.index()));
            }
            (M::Sub, Some(O::Register(Register::Eax)), Some(O::Expr(expr))) => {
                self.emit(0x2D);
                self.emit_i32(expr.eval());
            }
            (M::Sub, Some(O::Register(dst)), Some(O::Expr(expr))) => {
                self.emit(0x81);
                self.emit(modrm(0b11, 5, dst.index()));
                self.emit_i32(expr.eval());
            }

            (M::Imul, Some(O::Register(dst)), Some(O::Register(src))) => {
                self.emit(0x0F);
                self.emit(0xAF);
                self.emit(modrm(0b11, dst.index(), src.index()));
            }

            (M::Xor, Some(O::Register(dst)), Some(O::Register(src))) => {
                self.emit(0x33);
                self.emit(modrm(0b11, dst.index(), src.index()));
            }

            (M::Cmp, Some(O::Register(Register::Eax)), Some(O::Expr(expr))) => {
                self.emit(0x3D);
                self.emit_i32(expr.eval());
            }
            (M::Cmp, Some(O::Register(dst)), Some(O::Expr(expr))) => {
                self.emit(0x81);
                self.emit(modrm(0b11, 7, dst.index()));
                self.emit_i32(expr.eval());
            }

            (M::Test, Some(O::Register(Register::Eax)), Some(O::Expr(expr))) => {
                self.emit(0xA9);
                self.emit_i32(expr.eval());
            }
            (M::Test, Some(O::Register(dst)), Some(O::Expr(expr))) => {
                self.emit(0xF7);
                self.emit(modrm(0b11, 0, dst.index()));
                self.emit_i32(expr.eval());
            }

            (M::Idiv, Some(O::Register(operand)), None) => {
                self.emit(0xF7);
                self.emit(modrm(0b11, 7, operand.index()));
            }
            (M::Div, Some(O::Register(operand)), None) => {
                self.emit(0xF7);
                self.emit(modrm(0b11, 6, operand.index()));
            }
            (M::Neg, Some(O::Register(operand)), None) => {
                self.emit(0xF7);
                self.emit(modrm(0b11, 3, operand.index()));
            }
            (M::Inc, Some(O::Register(operand)), None) => {
                self.emit(0xFF);
                self.emit(modrm(0b11, 0, operand.index()));
            }
            (M::Dec, Some(O::Register(operand)), None) => {
                self.emit(0xFF);
                self.emit(modrm(0b11, 1, operand.index()));
            }

            (M::Push, Some(O::Expr(expr)), None) => {
                self.emit(0x68);
                self.emit_i32(expr.eval());
            }
            (M::Push, Some(O::Label(name)), None) => {
                self.emit(0x68);
                let name = name.clone();
                self.emit_abs_reference(&name, line);
            }
            (M::Push, Some(O::Register(operand)), None) => {
                self.emit(0xFF);
                self.emit(modrm(0b11, 6, operand.index()));
            }
            (M::Push, Some(O::Memory { base, displacement }), None) => {
                let displacement = self.check_memory(*base, displacement, line);
                self.emit(0xFF);
                self.emit(modrm(0b01, 6, Register::Ebp.index()));
                self.emit(displacement as u8);
            }
            (M::Pop, Some(O::Register(operand)), None) => {
                self.emit(0x58 + operand.index());
            }

            (M::Cdq, None, None) => self.emit(0x99),
            (M::Ret, None, None) => self.emit(0xC3),

            (M::Call, Some(O::Label(name)), None) => {
                self.emit(0xE8);
                let name = name.clone();
                self.emit_rel_reference(&name, line);
            }
            (M::Jmp, Some(O::Label(name)), None) => {
                self.emit(0xE9);
                let name = name.clone();
                self.emit_rel_reference(&name, line);
            }
            (M::Je | M::Jnz | M::Jg, Some(O::Label(name)), None) => {
                self.emit(0x0F);
                self.emit(match mnemonic {
                    M::Je => 0x84,
                    M::Jnz => 0x85,
                    _ => 0x8F,
                });
                let name = name.clone();
                self.emit_rel_reference(&name, line);
            }

            (M::Int, Some(O::Expr(expr)), None) => {
                self.emit(0xCD);
                self.emit(expr.eval() as u8);
            }

            _ => self.report_operands(mnemonic, line),
        }
    }
}

fn read_u32(code: &[u8], site: usize) -> u32 {
    u32::from_le_bytes(code[site..site + 4].try_into().unwrap())
}

fn write_u32(code: &mut [u8], site: usize, value: u32) {
    code[site..site + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::assembler::parser::Parser;

    fn encode(source: &str) -> (Assembly, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let statements = Parser::parse(source, &mut diagnostics);
        let assembly = Encoder::encode(&statements, &mut diagnostics);
        (assembly, diagnostics)
    }

    fn bytes(source: &str) -> Vec<u8> {
        let (assembly, diagnostics) = encode(source);
        assert!(!diagnostics.has_errors());
        assembly.code
    }

    #[test]
    fn register_to_register_moves() {
        assert_eq!(bytes("mov eax, ecx"), vec![0x89, 0xC8]);
        assert_eq!(bytes("mov ebp, esp"), vec![0x89, 0xE5]);
    }

    #[test]
    fn immediate_loads_use_the_short_form() {
        assert_eq!(bytes("mov eax, 5"), vec![0xB8, 0x05, 0x00, 0x00, 0x00]);
        assert_eq!(bytes("mov ebx, 1"), vec![0xBB, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn frame_slot_accesses_use_a_byte_displacement() {
        assert_eq!(bytes("mov eax, [ebp + 8]"), vec![0x8B, 0x45, 0x08]);
        assert_eq!(bytes("mov [ebp - 4], eax"), vec![0x89, 0x45, 0xFC]);
        assert_eq!(bytes("push [ebp + 12]"), vec![0xFF, 0x75, 0x0C]);
    }

    #[test]
    fn eax_immediates_take_the_dedicated_opcodes() {
        assert_eq!(bytes("add eax, 3"), vec![0x05, 0x03, 0x00, 0x00, 0x00]);
        assert_eq!(bytes("sub eax, 3"), vec![0x2D, 0x03, 0x00, 0x00, 0x00]);
        assert_eq!(bytes("cmp eax, 0"), vec![0x3D, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(bytes("add esp, 8"), vec![0x81, 0xC4, 0x08, 0x00, 0x00, 0x00]);
        assert_eq!(bytes("sub esp, 8"), vec![0x81, 0xEC, 0x08, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn single_operand_groups_share_their_opcode_byte() {
        assert_eq!(bytes("idiv ecx"), vec![0xF7, 0xF9]);
        assert_eq!(bytes("neg esi"), vec![0xF7, 0xDE]);
        assert_eq!(bytes("inc edi"), vec![0xFF, 0xC7]);
        assert_eq!(bytes("dec edi"), vec![0xFF, 0xCF]);
        assert_eq!(bytes("push ebp"), vec![0xFF, 0xF5]);
        assert_eq!(bytes("pop ebp"), vec![0x5D]);
    }

    #[test]
    fn zero_length_instructions() {
        assert_eq!(bytes("cdq"), vec![0x99]);
        assert_eq!(bytes("ret"), vec![0xC3]);
        assert_eq!(bytes("int 0x80"), vec![0xCD, 0x80]);
    }

    #[test]
    fn backward_jumps_patch_to_negative_displacements() {
        // _L0 sits at 0; jmp field follows a 1-byte opcode at offset 1,
        // so the displacement is 0 - 5 = -5.
        assert_eq!(
            bytes("_L0:\njmp _L0"),
            vec![0xE9, 0xFB, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn forward_conditional_jumps_patch_to_positive_displacements() {
        // je occupies 6 bytes, ret 1; _L0 is at 7, next instruction at 6.
        assert_eq!(
            bytes("je _L0\nret\n_L0:\nret"),
            vec![0x0F, 0x84, 0x01, 0x00, 0x00, 0x00, 0xC3, 0xC3]
        );
    }

    #[test]
    fn calls_to_defined_labels_need_no_relocation() {
        let (assembly, diagnostics) = encode("call f\nret\nf:\nret");
        assert!(!diagnostics.has_errors());
        assert!(assembly.relocations.is_empty());
        assert_eq!(assembly.code[0], 0xE8);
        // f at 6, next instruction at 5
        assert_eq!(read_u32(&assembly.code, 1), 1);
    }

    #[test]
    fn calls_to_undefined_labels_become_relocations() {
        let (assembly, diagnostics) = encode("call _print_int\nret");
        assert!(!diagnostics.has_errors());

        assert_eq!(
            assembly.relocations,
            vec![RelocationSite {
                offset: 1,
                label: "_print_int".to_string(),
            }]
        );
        assert_eq!(assembly.symbols.get("_print_int"), Some(&None));
    }

    #[test]
    fn absolute_references_add_the_org_base() {
        let (assembly, diagnostics) = encode("org 0x08048000\n_start:\nret\npush _start");
        assert!(!diagnostics.has_errors());
        // push opcode at 1, field at 2
        assert_eq!(read_u32(&assembly.code, 2), 0x08048000);
    }

    #[test]
    fn absolute_references_to_undefined_labels_are_errors() {
        let (_, diagnostics) = encode("push missing\nret");
        assert!(diagnostics.has_errors());
        assert!(diagnostics.sorted()[0].message.contains("missing"));
        assert_eq!(diagnostics.sorted()[0].line, 1);
    }

    #[test]
    fn duplicate_label_definitions_are_errors() {
        let (_, diagnostics) = encode("f:\nret\nf:\nret");
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.sorted()[0].line, 3);
    }

    #[test]
    fn symbols_come_out_name_sorted_with_their_offsets() {
        let (assembly, diagnostics) = encode("b:\nret\na:\nret\ncall c");
        assert!(!diagnostics.has_errors());

        let names: Vec<&String> = assembly.symbols.keys().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(assembly.symbols["a"], Some(1));
        assert_eq!(assembly.symbols["b"], Some(0));
        assert_eq!(assembly.symbols["c"], None);
    }

    #[test]
    fn oversized_displacements_are_rejected() {
        let (_, diagnostics) = encode("mov eax, [ebp + 200]");
        assert!(diagnostics.has_errors());
    }
}
