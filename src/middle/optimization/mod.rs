//! Quad-level cleanup passes.
//!
//! Every rewrite happens in place: a removed quad becomes an
//! `EmptyQuad` in its old position, and labels never move, since jump
//! resolution keys on label identity rather than quad index. The passes
//! are local and independent of the order they run in.

use crate::middle::{
    cfg::{BlockId, Cfg},
    tac::{Opcode, Quad, TacUnit},
};

/// Runs the whole pass list over one lowered unit.
pub fn perform_optimizations(unit: &mut TacUnit, cfg: &mut Cfg) {
    mark_unreachable_blocks(cfg, unit);
    fold_constants(unit);
    merge_store_fetch_pairs(unit);
    simplify_identities(unit);
}

/// Flood-fills the jump edges from every entry quad and function
/// prologue, then clears the reachable mark on everything the fill
/// never visited. Rooting at each `FunBegin` keeps functions alive even
/// when their only callers sit in other units; what dies is intra-
/// function code no jump chain can reach. The block holding the program
/// entry is itself a root, so it can never lose its mark.
pub fn mark_unreachable_blocks(cfg: &mut Cfg, unit: &TacUnit) {
    let mut worklist = Vec::new();

    for (id, block) in cfg.blocks.enumerate() {
        let roots_here = unit.quads[block.range.clone()]
            .iter()
            .any(|quad| matches!(quad.op, Opcode::Entry | Opcode::FunBegin));

        if roots_here {
            worklist.push(id);
        }
    }

    for block in cfg.blocks.iter_mut() {
        block.reachable = false;
    }

    while let Some(id) = worklist.pop() {
        if cfg.blocks[id].reachable {
            continue;
        }

        cfg.blocks[id].reachable = true;
        worklist.extend(cfg.blocks[id].successors.iter().copied());
    }
}

/// Replaces any value-producing quad whose operands are both decimal
/// literals with a direct assignment of the computed result. Division
/// by a literal zero is left untouched rather than miscompiled; it
/// faults at runtime like any other zero divisor.
pub fn fold_constants(unit: &mut TacUnit) {
    for quad in &mut unit.quads {
        let (Ok(left), Ok(right)) = (quad.opd1.parse::<i32>(), quad.opd2.parse::<i32>()) else {
            continue;
        };

        let result = match quad.op {
            Opcode::Plus => left.wrapping_add(right),
            Opcode::Minus => left.wrapping_sub(right),
            Opcode::Star => left.wrapping_mul(right),
            Opcode::Slash => match left.checked_div(right) {
                Some(quotient) => quotient,
                None => continue,
            },
            Opcode::Less => (left < right) as i32,
            Opcode::EqualEqual => (left == right) as i32,
            Opcode::And => (left != 0 && right != 0) as i32,
            Opcode::Or => (left != 0 || right != 0) as i32,
            _ => continue,
        };

        *quad = Quad::new(quad.target.clone(), result.to_string(), "", Opcode::Assign);
    }
}

/// Merges a value-producing quad with an immediately following store of
/// its result, so `_t1 <- a + b; x <- _t1` collapses into `x <- a + b`.
/// The producing quads only ever target single-use expression
/// temporaries, which makes the pair safe to coalesce; a plain copy is
/// excluded because its target can be a named slot that is read again
/// later. Pairs split by a label are left alone, since the second quad
/// can be entered without the first having run.
pub fn merge_store_fetch_pairs(unit: &mut TacUnit) {
    for index in 1..unit.quads.len() {
        if unit.labels[index].is_some() {
            continue;
        }

        let producing = &unit.quads[index - 1];
        let store = &unit.quads[index];

        let merges = matches!(
            producing.op,
            Opcode::Plus
                | Opcode::Minus
                | Opcode::Star
                | Opcode::Slash
                | Opcode::Less
                | Opcode::EqualEqual
                | Opcode::And
                | Opcode::Or
                | Opcode::CallResult
        ) && store.op == Opcode::Assign
            && !producing.target.is_empty()
            && store.opd1 == producing.target;

        if !merges {
            continue;
        }

        unit.quads[index - 1].target = unit.quads[index].target.clone();
        unit.quads[index] = Quad::empty();
    }
}

/// Rewrites additions of zero, multiplications by one, and their
/// mirrored forms into plain assignments.
pub fn simplify_identities(unit: &mut TacUnit) {
    for quad in &mut unit.quads {
        let survivor = match quad.op {
            Opcode::Plus if quad.opd2 == "0" => quad.opd1.clone(),
            Opcode::Plus if quad.opd1 == "0" => quad.opd2.clone(),
            Opcode::Minus if quad.opd2 == "0" => quad.opd1.clone(),
            Opcode::Star if quad.opd2 == "1" => quad.opd1.clone(),
            Opcode::Star if quad.opd1 == "1" => quad.opd2.clone(),
            Opcode::Slash if quad.opd2 == "1" => quad.opd1.clone(),
            _ => continue,
        };

        *quad = Quad::new(quad.target.clone(), survivor, "", Opcode::Assign);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;

    #[test]
    fn folding_rewrites_literal_arithmetic_into_assigns() {
        let mut unit = TacUnit::new();
        unit.push(Quad::new("_t0", "2", "3", Opcode::Star));
        unit.push(Quad::new("_t1", "7", "7", Opcode::EqualEqual));
        unit.push(Quad::new("_t2", "4", "9", Opcode::Less));

        fold_constants(&mut unit);

        assert_eq!(unit.quads[0], Quad::new("_t0", "6", "", Opcode::Assign));
        assert_eq!(unit.quads[1], Quad::new("_t1", "1", "", Opcode::Assign));
        assert_eq!(unit.quads[2], Quad::new("_t2", "1", "", Opcode::Assign));
    }

    #[test]
    fn folding_is_idempotent() {
        let mut unit = TacUnit::new();
        unit.push(Quad::new("_t0", "-4", "6", Opcode::Plus));
        unit.push(Quad::new("_t1", "1", "0", Opcode::And));
        unit.push(Quad::new("_t2", "_t0", "2", Opcode::Plus));

        fold_constants(&mut unit);
        let once = unit.quads.clone();
        fold_constants(&mut unit);

        assert_eq!(unit.quads, once);
    }

    #[test]
    fn folding_never_touches_structural_quads() {
        let mut unit = TacUnit::new();
        unit.push(Quad::new("", "8", "", Opcode::PopArgs));
        unit.push(Quad::new("", "5", "", Opcode::PushArg));
        unit.push_labeled(Quad::new("", "", "12", Opcode::FunBegin), "f");

        let before = unit.quads.clone();
        fold_constants(&mut unit);

        assert_eq!(unit.quads, before);
    }

    #[test]
    fn folding_skips_division_by_a_literal_zero() {
        let mut unit = TacUnit::new();
        unit.push(Quad::new("_t0", "5", "0", Opcode::Slash));

        fold_constants(&mut unit);

        assert_eq!(unit.quads[0].op, Opcode::Slash);
    }

    #[test]
    fn store_fetch_pairs_merge_into_the_producing_quad() {
        let mut unit = TacUnit::new();
        unit.push(Quad::new("_t0", "2", "3", Opcode::Star));
        unit.push(Quad::new("_t1", "1", "_t0", Opcode::Plus));
        unit.push(Quad::new("_t2", "_t1", "", Opcode::Assign));

        merge_store_fetch_pairs(&mut unit);

        assert_eq!(unit.quads[1], Quad::new("_t2", "1", "_t0", Opcode::Plus));
        assert_eq!(unit.quads[2], Quad::empty());
    }

    #[test]
    fn plain_copies_never_merge() {
        let mut unit = TacUnit::new();
        unit.push(Quad::new("_t0", "5", "", Opcode::Assign));
        unit.push(Quad::new("_t1", "_t0", "", Opcode::Assign));

        let before = unit.quads.clone();
        merge_store_fetch_pairs(&mut unit);

        assert_eq!(unit.quads, before);
    }

    #[test]
    fn merges_stop_at_labels() {
        let mut unit = TacUnit::new();
        unit.push(Quad::new("_t0", "a", "b", Opcode::Plus));
        unit.push_labeled(Quad::new("_t1", "_t0", "", Opcode::Assign), "_L0");

        let before = unit.quads.clone();
        merge_store_fetch_pairs(&mut unit);

        assert_eq!(unit.quads, before);
    }

    #[test]
    fn identities_collapse_to_plain_assigns() {
        let mut unit = TacUnit::new();
        unit.push(Quad::new("_t0", "_x", "0", Opcode::Plus));
        unit.push(Quad::new("_t1", "0", "_x", Opcode::Plus));
        unit.push(Quad::new("_t2", "_x", "0", Opcode::Minus));
        unit.push(Quad::new("_t3", "1", "_x", Opcode::Star));
        unit.push(Quad::new("_t4", "_x", "1", Opcode::Slash));
        unit.push(Quad::new("_t5", "0", "_x", Opcode::Minus));

        simplify_identities(&mut unit);

        for index in 0..5 {
            assert_eq!(unit.quads[index].op, Opcode::Assign);
            assert_eq!(unit.quads[index].opd1, "_x");
        }

        // 0 - x is a negation, not an identity
        assert_eq!(unit.quads[5].op, Opcode::Minus);
    }

    #[test]
    fn passes_never_change_the_quad_count_or_labels() {
        let mut unit = TacUnit::new();
        unit.push_labeled(Quad::new("", "", "", Opcode::FunBegin), "f");
        unit.push(Quad::new("_t0", "1", "2", Opcode::Plus));
        unit.push(Quad::new("_t1", "_t0", "", Opcode::Assign));
        unit.push(Quad::new("", "_L0", "", Opcode::Goto));
        unit.mark_label("_L0");
        unit.push(Quad::new("", "", "", Opcode::FunEnd));

        let labels = unit.labels.clone();
        let count = unit.len();

        let mut cfg = Cfg::build(&unit);
        perform_optimizations(&mut unit, &mut cfg);

        assert_eq!(unit.len(), count);
        assert_eq!(unit.labels, labels);
    }

    #[test]
    fn entry_and_function_blocks_are_always_reachable() {
        let mut unit = TacUnit::new();
        unit.push_labeled(Quad::new("", "", "", Opcode::Entry), "_start");
        unit.push(Quad::new("", "main", "", Opcode::CallNil));
        unit.push(Quad::new("", "", "", Opcode::Exit));
        unit.push_labeled(Quad::new("", "", "", Opcode::FunBegin), "main");
        unit.push(Quad::new("", "", "", Opcode::FunEnd));

        let mut cfg = Cfg::build(&unit);
        mark_unreachable_blocks(&mut cfg, &unit);

        assert!(cfg.blocks.iter().all(|block| block.reachable));
    }

    #[test]
    fn blocks_no_jump_chain_reaches_lose_their_mark() {
        let mut unit = TacUnit::new();
        unit.push_labeled(Quad::new("", "", "", Opcode::FunBegin), "f");
        unit.push(Quad::new("", "_L1", "", Opcode::Goto));
        // _L0 is never a jump target
        unit.mark_label("_L0");
        unit.push(Quad::new("_t0", "1", "", Opcode::Assign));
        unit.mark_label("_L1");
        unit.push(Quad::new("", "", "", Opcode::FunEnd));

        let mut cfg = Cfg::build(&unit);
        mark_unreachable_blocks(&mut cfg, &unit);

        assert!(cfg.blocks[BlockId::new(0)].reachable);
        assert!(!cfg.blocks[BlockId::new(1)].reachable);
        assert!(cfg.blocks[BlockId::new(2)].reachable);
    }
}
