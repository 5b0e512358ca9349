//! Control flow graph over one unit's quad array.
//!
//! A block begins at index 0 and at every labeled index, so the blocks
//! partition the whole quad range with no gaps or overlaps. Edges come
//! from the jump quads alone; calls are not edges, because a callee may
//! live in a different unit entirely. The dead code pass compensates by
//! rooting its search at every function entry, not just the program
//! entry.

use hashbrown::HashMap;

use crate::{
    index::{Index, IndexVec, simple_index},
    middle::tac::{Opcode, TacUnit},
};

simple_index! {
    /// Identifies one basic block within its unit's graph.
    pub struct BlockId;
}

/// A maximal straight-line run of quads with one entry and one exit.
#[derive(Debug)]
pub struct BasicBlock {
    /// Indices into the unit's quad array.
    pub range: std::ops::Range<usize>,
    pub successors: Vec<BlockId>,
    /// Cleared by the dead code pass for blocks no jump chain reaches.
    /// A fresh graph treats every block as live.
    pub reachable: bool,
}

#[derive(Debug)]
pub struct Cfg {
    pub blocks: IndexVec<BlockId, BasicBlock>,
    block_of_label: HashMap<String, BlockId>,
}

impl Cfg {
    pub fn build(unit: &TacUnit) -> Self {
        let mut starts = Vec::new();

        for (index, label) in unit.labels.iter().enumerate() {
            if index == 0 || label.is_some() {
                starts.push(index);
            }
        }

        let mut blocks = IndexVec::new();
        let mut block_of_label = HashMap::new();

        for (position, &start) in starts.iter().enumerate() {
            let end = starts.get(position + 1).copied().unwrap_or(unit.len());

            let id = blocks.push(BasicBlock {
                range: start..end,
                successors: Vec::new(),
                reachable: true,
            });

            if let Some(label) = &unit.labels[start] {
                block_of_label.insert(label.clone(), id);
            }
        }

        let mut cfg = Self {
            blocks,
            block_of_label,
        };
        cfg.connect_jump_edges(unit);
        cfg
    }

    fn connect_jump_edges(&mut self, unit: &TacUnit) {
        for index in 0..self.blocks.len() {
            let id = BlockId::new(index);
            let range = self.blocks[id].range.clone();
            let mut successors = Vec::new();

            for quad in &unit.quads[range] {
                match quad.op {
                    Opcode::Goto => {
                        successors.push(self.resolve_jump_target(&quad.opd1));
                    }
                    Opcode::CondGoto => {
                        successors.push(self.resolve_jump_target(&quad.opd1));
                        successors.push(self.resolve_jump_target(&quad.opd2));
                    }
                    _ => {}
                }
            }

            self.blocks[id].successors = successors;
        }
    }

    /// Jump targets are always marked within their own unit; a miss
    /// here means the quad stream was built wrong.
    fn resolve_jump_target(&self, label: &str) -> BlockId {
        match self.block_of_label.get(label) {
            Some(&block) => block,
            None => panic!("jump to label `{label}` which is not marked in this unit"),
        }
    }
}
