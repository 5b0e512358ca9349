//! Three-address code.
//!
//! Each function body flattens into quads of an opcode, a target, and up
//! to two operands. Operands are plain strings: frame temporaries
//! (`_t0`), base-10 integer constants, jump labels, or function names.
//! An empty string means the slot is unused. A parallel label array
//! marks quads that are jump targets; a label always sits on its own
//! `EmptyQuad` (or on a `FunBegin`), so two control paths can never
//! fight over one label slot.

pub mod ast_lowering;
pub mod pretty_print;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Opcode {
    EmptyQuad,
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    EqualEqual,
    Less,
    Or,
    And,
    Goto,
    CondGoto,
    Entry,
    Exit,
    FunBegin,
    FunEnd,
    PushArg,
    PopArgs,
    CallResult,
    CallNil,
    Return,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quad {
    pub target: String,
    pub opd1: String,
    pub opd2: String,
    pub op: Opcode,
}

impl Quad {
    pub fn new(
        target: impl Into<String>,
        opd1: impl Into<String>,
        opd2: impl Into<String>,
        op: Opcode,
    ) -> Self {
        Self {
            target: target.into(),
            opd1: opd1.into(),
            opd2: opd2.into(),
            op,
        }
    }

    pub fn empty() -> Self {
        Self::new("", "", "", Opcode::EmptyQuad)
    }
}

impl core::fmt::Display for Quad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}, {}, {}", self.op, self.target, self.opd1, self.opd2)
    }
}

/// A lowered compilation unit: the quad array and its parallel label
/// array. The two are always the same length; `labels[i]` names quad `i`
/// as a jump target.
#[derive(Debug, Default)]
pub struct TacUnit {
    pub quads: Vec<Quad>,
    pub labels: Vec<Option<String>>,
}

impl TacUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Appends an unlabeled quad, returning its index.
    pub fn push(&mut self, quad: Quad) -> usize {
        self.quads.push(quad);
        self.labels.push(None);
        self.quads.len() - 1
    }

    pub fn push_labeled(&mut self, quad: Quad, label: impl Into<String>) -> usize {
        self.quads.push(quad);
        self.labels.push(Some(label.into()));
        self.quads.len() - 1
    }

    /// Plants a label on a fresh `EmptyQuad` so the next emitted quads
    /// execute under it.
    pub fn mark_label(&mut self, label: impl Into<String>) -> usize {
        self.push_labeled(Quad::empty(), label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &Quad)> {
        self.labels
            .iter()
            .map(|label| label.as_deref())
            .zip(self.quads.iter())
    }
}

/// Compilation-wide counter for synthesized jump labels. Both IR lowering
/// and the code generator draw from it, so every `_L<n>` in a run is
/// unique across all units.
#[derive(Debug, Default)]
pub struct Session {
    next_label: u32,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_label(&mut self) -> String {
        let label = format!("_L{}", self.next_label);
        self.next_label += 1;
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quads_and_labels_stay_parallel() {
        let mut unit = TacUnit::new();
        unit.push(Quad::new("_t0", "1", "2", Opcode::Plus));
        unit.mark_label("_L0");
        unit.push(Quad::new("", "_L0", "", Opcode::Goto));

        assert_eq!(unit.quads.len(), unit.labels.len());
        assert_eq!(unit.labels[1].as_deref(), Some("_L0"));
        assert_eq!(unit.quads[1].op, Opcode::EmptyQuad);
    }

    #[test]
    fn session_labels_never_repeat() {
        let mut session = Session::new();
        assert_eq!(session.new_label(), "_L0");
        assert_eq!(session.new_label(), "_L1");
        assert_eq!(session.new_label(), "_L2");
    }

    #[test]
    fn quads_render_with_their_operands() {
        let quad = Quad::new("_t1", "_t0", "3", Opcode::Star);
        assert_eq!(quad.to_string(), "Star, _t1, _t0, 3");
    }
}
