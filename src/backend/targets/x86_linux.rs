//! Quad to x86-32 lowering.
//!
//! Every value lives in its `[ebp + offset]` frame slot; eax and ecx
//! are scratch for one quad at a time, so no values stay in registers
//! across quads. Comparison and boolean quads materialize their 0/1
//! result through a flag-conditional jump over a `mov`, since the
//! target has no byte-wise set instruction in its repertoire.
//!
//! Quads in blocks the dead code pass unmarked are not emitted.

use std::collections::BTreeMap;

use crate::{
    backend::targets::CodeGenerator,
    middle::{
        cfg::Cfg,
        frame::Frame,
        tac::{Opcode, Quad, Session, ast_lowering::LoweredUnit},
    },
};

/// Print helpers appended to the listing of the unit defining `main`.
const RUNTIME_HELPERS: &str = include_str!("./x86_linux_runtime.s");

pub struct CodeGeneratorX86Linux;

impl CodeGenerator for CodeGeneratorX86Linux {
    fn generate_listing(&self, unit: &LoweredUnit, cfg: &Cfg, session: &mut Session) -> String {
        let mut lowering = Lowering {
            lines: Vec::new(),
            frames: &unit.frames,
            frame: None,
            session,
        };

        let mut live = vec![true; unit.tac.len()];
        for block in cfg.blocks.iter() {
            if !block.reachable {
                live[block.range.clone()].fill(false);
            }
        }

        for (index, quad) in unit.tac.quads.iter().enumerate() {
            if !live[index] {
                continue;
            }

            if let Some(label) = &unit.tac.labels[index] {
                if quad.op == Opcode::FunBegin && !lowering.lines.is_empty() {
                    lowering.lines.push(String::new());
                }
                lowering.emit_label(label);
            }

            lowering.lower_quad(quad, &unit.tac.labels[index]);
        }

        let mut listing = lowering.lines.join("\n");
        listing.push('\n');

        if unit.defines_main {
            listing.push('\n');
            listing.push_str(RUNTIME_HELPERS);
        }

        listing
    }
}

struct Lowering<'unit, 'run> {
    lines: Vec<String>,
    frames: &'unit BTreeMap<String, Frame>,
    /// Frame of the function whose body is being emitted; set by each
    /// `FunBegin`, absent only while the entry preamble goes out.
    frame: Option<&'unit Frame>,
    session: &'run mut Session,
}

impl<'unit, 'run> Lowering<'unit, 'run> {
    fn emit(&mut self, instruction: impl Into<String>) {
        self.lines.push(format!("    {}", instruction.into()));
    }

    fn emit_label(&mut self, label: &str) {
        self.lines.push(format!("{label}:"));
    }

    /// The addressable form of an operand: integer constants pass
    /// through, everything else resolves to its frame slot.
    fn value(&self, operand: &str) -> String {
        if operand.parse::<i32>().is_ok() {
            return operand.to_string();
        }

        let offset = self
            .frame
            .and_then(|frame| frame.fp_offset(operand))
            .unwrap_or_else(|| panic!("operand `{operand}` has no frame slot"));

        if offset < 0 {
            format!("[ebp - {}]", -offset)
        } else {
            format!("[ebp + {offset}]")
        }
    }

    fn load(&mut self, register: &str, operand: &str) {
        let value = self.value(operand);
        self.emit(format!("mov {register}, {value}"));
    }

    fn store(&mut self, operand: &str) {
        let slot = self.value(operand);
        self.emit(format!("mov {slot}, eax"));
    }

    /// Leaves eax as 1 if the conditional jump falls through taken, 0
    /// otherwise. The `mov` before the jump does not touch flags.
    fn select_by_flag(&mut self, jump: &str) {
        let done = self.session.new_label();
        self.emit("mov eax, 1");
        self.emit(format!("{jump} {done}"));
        self.emit("mov eax, 0");
        self.emit_label(&done);
    }

    fn lower_quad(&mut self, quad: &Quad, label: &Option<String>) {
        match quad.op {
            Opcode::EmptyQuad => {}

            Opcode::Assign => {
                self.load("eax", &quad.opd1);
                self.store(&quad.target);
            }

            Opcode::Plus | Opcode::Minus | Opcode::Star => {
                self.load("eax", &quad.opd1);
                self.load("ecx", &quad.opd2);
                self.emit(match quad.op {
                    Opcode::Plus => "add eax, ecx",
                    Opcode::Minus => "sub eax, ecx",
                    _ => "imul eax, ecx",
                });
                self.store(&quad.target);
            }

            Opcode::Slash => {
                self.load("eax", &quad.opd1);
                self.load("ecx", &quad.opd2);
                self.emit("cdq");
                self.emit("idiv ecx");
                self.store(&quad.target);
            }

            // a < b exactly when b - a is positive
            Opcode::Less => {
                self.load("eax", &quad.opd1);
                self.load("ecx", &quad.opd2);
                self.emit("sub ecx, eax");
                self.select_by_flag("jg");
                self.store(&quad.target);
            }

            Opcode::EqualEqual => {
                self.load("eax", &quad.opd1);
                self.load("ecx", &quad.opd2);
                self.emit("sub ecx, eax");
                self.select_by_flag("je");
                self.store(&quad.target);
            }

            // Operands are 0 or 1, so the sum is zero only when both
            // are false and the product odd only when both are true.
            Opcode::Or => {
                self.load("eax", &quad.opd1);
                self.load("ecx", &quad.opd2);
                self.emit("add eax, ecx");
                self.select_by_flag("jnz");
                self.store(&quad.target);
            }

            Opcode::And => {
                self.load("eax", &quad.opd1);
                self.load("ecx", &quad.opd2);
                self.emit("imul eax, ecx");
                self.emit("test eax, 1");
                self.select_by_flag("jnz");
                self.store(&quad.target);
            }

            Opcode::Goto => {
                self.emit(format!("jmp {}", quad.opd1));
            }

            Opcode::CondGoto => {
                self.load("eax", &quad.target);
                self.emit("cmp eax, 0");
                self.emit(format!("je {}", quad.opd2));
                self.emit(format!("jmp {}", quad.opd1));
            }

            Opcode::Entry => {
                self.emit("mov ebp, esp");
            }

            Opcode::Exit => {
                self.emit("mov ebx, eax");
                self.emit("mov eax, 1");
                self.emit("int 0x80");
            }

            Opcode::FunBegin => {
                let name = label
                    .as_deref()
                    .unwrap_or_else(|| panic!("FunBegin without a function label"));
                self.frame = Some(
                    self.frames
                        .get(name)
                        .unwrap_or_else(|| panic!("no frame recorded for `{name}`")),
                );

                self.emit("push ebp");
                self.emit("mov ebp, esp");
                if quad.opd2 != "0" {
                    self.emit(format!("sub esp, {}", quad.opd2));
                }
            }

            Opcode::FunEnd => {
                self.emit("mov esp, ebp");
                self.emit("pop ebp");
                self.emit("ret");
            }

            Opcode::Return => {
                if !quad.opd1.is_empty() {
                    self.load("eax", &quad.opd1);
                }
                self.emit("mov esp, ebp");
                self.emit("pop ebp");
                self.emit("ret");
            }

            Opcode::PushArg => {
                let value = self.value(&quad.opd1);
                self.emit(format!("push {value}"));
            }

            Opcode::PopArgs => {
                self.emit(format!("add esp, {}", quad.opd1));
            }

            Opcode::CallResult => {
                self.emit(format!("call {}", quad.opd1));
                self.store(&quad.target);
            }

            Opcode::CallNil => {
                self.emit(format!("call {}", quad.opd1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middle::tac::TacUnit;

    fn frame_with_temps(count: usize) -> Frame {
        let mut frame = Frame::new();
        for _ in 0..count {
            frame.new_temp();
        }
        frame
    }

    fn listing_for(unit: LoweredUnit) -> String {
        let cfg = Cfg::build(&unit.tac);
        let mut session = Session::new();
        CodeGeneratorX86Linux.generate_listing(&unit, &cfg, &mut session)
    }

    fn function_unit(quads: TacUnit, temps: usize) -> LoweredUnit {
        let mut frames = BTreeMap::new();
        frames.insert("f".to_string(), frame_with_temps(temps));

        LoweredUnit {
            tac: quads,
            frames,
            defines_main: false,
        }
    }

    #[test]
    fn functions_get_a_prologue_and_return_epilogue() {
        let mut tac = TacUnit::new();
        tac.push_labeled(Quad::new("", "", "8", Opcode::FunBegin), "f");
        tac.push(Quad::new("", "0", "", Opcode::Return));
        tac.push(Quad::new("", "", "", Opcode::FunEnd));

        let listing = listing_for(function_unit(tac, 2));

        let expected = [
            "f:",
            "    push ebp",
            "    mov ebp, esp",
            "    sub esp, 8",
            "    mov eax, 0",
            "    mov esp, ebp",
            "    pop ebp",
            "    ret",
        ];
        for line in expected {
            assert!(listing.contains(line), "missing `{line}` in:\n{listing}");
        }
    }

    #[test]
    fn a_whole_function_lowers_line_for_line() {
        let mut tac = TacUnit::new();
        tac.push_labeled(Quad::new("", "", "4", Opcode::FunBegin), "f");
        tac.push(Quad::new("_t0", "7", "", Opcode::Assign));
        tac.push(Quad::new("", "_t0", "", Opcode::Return));
        tac.push(Quad::new("", "", "", Opcode::FunEnd));

        let listing = listing_for(function_unit(tac, 1));

        assert_eq!(
            listing,
            indoc::indoc! {"
                f:
                    push ebp
                    mov ebp, esp
                    sub esp, 4
                    mov eax, 7
                    mov [ebp - 4], eax
                    mov eax, [ebp - 4]
                    mov esp, ebp
                    pop ebp
                    ret
                    mov esp, ebp
                    pop ebp
                    ret
            "}
        );
    }

    #[test]
    fn arithmetic_runs_through_the_scratch_registers() {
        let mut tac = TacUnit::new();
        tac.push_labeled(Quad::new("", "", "12", Opcode::FunBegin), "f");
        tac.push(Quad::new("_t2", "_t0", "5", Opcode::Plus));
        tac.push(Quad::new("", "", "", Opcode::FunEnd));

        let listing = listing_for(function_unit(tac, 3));

        assert!(listing.contains("    mov eax, [ebp - 4]"));
        assert!(listing.contains("    mov ecx, 5"));
        assert!(listing.contains("    add eax, ecx"));
        assert!(listing.contains("    mov [ebp - 12], eax"));
    }

    #[test]
    fn division_sign_extends_before_dividing() {
        let mut tac = TacUnit::new();
        tac.push_labeled(Quad::new("", "", "8", Opcode::FunBegin), "f");
        tac.push(Quad::new("_t1", "_t0", "2", Opcode::Slash));
        tac.push(Quad::new("", "", "", Opcode::FunEnd));

        let listing = listing_for(function_unit(tac, 2));

        let cdq = listing.find("cdq").unwrap();
        let idiv = listing.find("idiv ecx").unwrap();
        assert!(cdq < idiv);
    }

    #[test]
    fn comparisons_select_their_result_over_a_fresh_label() {
        let mut tac = TacUnit::new();
        tac.push_labeled(Quad::new("", "", "12", Opcode::FunBegin), "f");
        tac.push(Quad::new("_t2", "_t0", "_t1", Opcode::Less));
        tac.push(Quad::new("", "", "", Opcode::FunEnd));

        let listing = listing_for(function_unit(tac, 3));

        assert!(listing.contains("    sub ecx, eax"));
        assert!(listing.contains("    jg _L0"));
        assert!(listing.contains("_L0:"));
        assert!(listing.contains("    mov eax, 1"));
        assert!(listing.contains("    mov eax, 0"));
    }

    #[test]
    fn conditional_jumps_test_against_zero() {
        let mut tac = TacUnit::new();
        tac.push_labeled(Quad::new("", "", "4", Opcode::FunBegin), "f");
        tac.push(Quad::new("_t0", "_Lyes", "_Lno", Opcode::CondGoto));
        tac.mark_label("_Lyes");
        tac.mark_label("_Lno");
        tac.push(Quad::new("", "", "", Opcode::FunEnd));

        let listing = listing_for(function_unit(tac, 1));

        assert!(listing.contains("    cmp eax, 0"));
        assert!(listing.contains("    je _Lno"));
        assert!(listing.contains("    jmp _Lyes"));
        assert!(listing.contains("_Lyes:"));
        assert!(listing.contains("_Lno:"));
    }

    #[test]
    fn calls_push_pop_and_capture_their_result() {
        let mut tac = TacUnit::new();
        tac.push_labeled(Quad::new("", "", "4", Opcode::FunBegin), "f");
        tac.push(Quad::new("", "7", "", Opcode::PushArg));
        tac.push(Quad::new("_t0", "g", "", Opcode::CallResult));
        tac.push(Quad::new("", "4", "", Opcode::PopArgs));
        tac.push(Quad::new("", "", "", Opcode::FunEnd));

        let listing = listing_for(function_unit(tac, 1));

        assert!(listing.contains("    push 7"));
        assert!(listing.contains("    call g"));
        assert!(listing.contains("    mov [ebp - 4], eax"));
        assert!(listing.contains("    add esp, 4"));
    }

    #[test]
    fn unreachable_blocks_are_left_out_of_the_listing() {
        let mut tac = TacUnit::new();
        tac.push_labeled(Quad::new("", "", "4", Opcode::FunBegin), "f");
        tac.push(Quad::new("", "_L9", "", Opcode::Goto));
        tac.mark_label("_L8");
        tac.push(Quad::new("_t0", "1", "", Opcode::Assign));
        tac.mark_label("_L9");
        tac.push(Quad::new("", "", "", Opcode::FunEnd));

        let unit = function_unit(tac, 1);
        let mut cfg = Cfg::build(&unit.tac);
        crate::middle::optimization::mark_unreachable_blocks(&mut cfg, &unit.tac);

        let mut session = Session::new();
        let listing = CodeGeneratorX86Linux.generate_listing(&unit, &cfg, &mut session);

        assert!(!listing.contains("_L8:"));
        assert!(listing.contains("_L9:"));
    }

    #[test]
    fn the_entry_preamble_exits_through_the_kernel() {
        let mut tac = TacUnit::new();
        tac.push_labeled(Quad::new("", "", "", Opcode::Entry), "_start");
        tac.push(Quad::new("", "main", "", Opcode::CallNil));
        tac.push(Quad::new("", "", "", Opcode::Exit));
        tac.push_labeled(Quad::new("", "", "0", Opcode::FunBegin), "main");
        tac.push(Quad::new("", "0", "", Opcode::Return));
        tac.push(Quad::new("", "", "", Opcode::FunEnd));

        let mut frames = BTreeMap::new();
        frames.insert("main".to_string(), Frame::new());
        let unit = LoweredUnit {
            tac,
            frames,
            defines_main: true,
        };

        let listing = listing_for(unit);

        assert!(listing.starts_with("_start:"));
        assert!(listing.contains("    call main"));
        assert!(listing.contains("    mov ebx, eax"));
        assert!(listing.contains("    int 0x80"));

        // zero-size frames skip the stack adjustment
        assert!(!listing.contains("sub esp, 0"));

        // the main unit carries the print runtime
        assert!(listing.contains("_print_int:"));
        assert!(listing.contains("_print_bool:"));
        assert!(listing.contains("_write_char:"));
    }

    #[test]
    fn library_units_do_not_carry_the_runtime() {
        let mut tac = TacUnit::new();
        tac.push_labeled(Quad::new("", "", "0", Opcode::FunBegin), "f");
        tac.push(Quad::new("", "", "", Opcode::FunEnd));

        let listing = listing_for(function_unit(tac, 0));

        assert!(!listing.contains("_print_int:"));
    }
}
