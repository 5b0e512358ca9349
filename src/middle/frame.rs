//! Per-function activation record bookkeeping.
//!
//! While a function body is lowered, the frame tracks lexical scopes and
//! hands out stack slots. Every name and intermediate gets a fresh IR
//! temporary (`_t0`, `_t1`, ...) from one per-frame counter, so shadowed
//! variables never collide. The scope stack is drained by the time
//! lowering finishes; the flat offset table survives for the code
//! generator, which addresses everything as `[ebp + offset]`.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::{frontend::intern::InternedSymbol, middle::ty::Type};

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: InternedSymbol,
    pub ir_name: String,
    pub ty: Type,
    pub fp_offset: i32,
}

#[derive(Debug, Default)]
pub struct Frame {
    scopes: Vec<HashMap<InternedSymbol, Symbol>>,
    fp_offsets: BTreeMap<String, i32>,
    next_temp: u32,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Returns the number of symbols the closed scope held.
    pub fn end_scope(&mut self) -> usize {
        self.scopes.pop().map(|scope| scope.len()).unwrap_or(0)
    }

    fn next_temp_name(&mut self) -> (String, u32) {
        let counter = self.next_temp;
        self.next_temp += 1;
        (format!("_t{counter}"), counter)
    }

    /// Allocate a fresh intermediate slot below the frame pointer.
    pub fn new_temp(&mut self) -> String {
        let (ir_name, counter) = self.next_temp_name();
        self.fp_offsets.insert(ir_name.clone(), -4 * (counter as i32 + 1));
        ir_name
    }

    /// Parameters live above the saved frame pointer and return address,
    /// so the k-th parameter sits at `ebp + 4 * (k + 2)`.
    pub fn declare_parameter(
        &mut self,
        name: InternedSymbol,
        ty: Type,
        index: usize,
    ) -> Option<Symbol> {
        let (ir_name, _) = self.next_temp_name();
        self.fp_offsets
            .insert(ir_name.clone(), 4 * (index as i32 + 2));

        self.declare(name, ir_name, ty, 4 * (index as i32 + 2))
    }

    /// Binds `name` in the innermost scope. Returns `None` when the scope
    /// already binds it, which the caller reports as a redeclaration.
    pub fn declare_local(&mut self, name: InternedSymbol, ty: Type) -> Option<Symbol> {
        let (ir_name, counter) = self.next_temp_name();
        let fp_offset = -4 * (counter as i32 + 1);
        self.fp_offsets.insert(ir_name.clone(), fp_offset);

        self.declare(name, ir_name, ty, fp_offset)
    }

    fn declare(
        &mut self,
        name: InternedSymbol,
        ir_name: String,
        ty: Type,
        fp_offset: i32,
    ) -> Option<Symbol> {
        let scope = self.scopes.last_mut()?;

        if scope.contains_key(&name) {
            return None;
        }

        let symbol = Symbol {
            name,
            ir_name,
            ty,
            fp_offset,
        };
        scope.insert(name, symbol.clone());

        Some(symbol)
    }

    /// Innermost binding of `name`, honoring shadowing.
    pub fn resolve(&self, name: InternedSymbol) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name))
    }

    pub fn fp_offset(&self, ir_name: &str) -> Option<i32> {
        self.fp_offsets.get(ir_name).copied()
    }

    /// Total temporaries handed out; the function prologue reserves
    /// `4 * temps_consumed()` bytes of stack.
    pub fn temps_consumed(&self) -> u32 {
        self.next_temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(value: &str) -> InternedSymbol {
        InternedSymbol::new(value)
    }

    #[test]
    fn parameters_sit_above_the_saved_frame_pointer() {
        let mut frame = Frame::new();
        frame.begin_scope();

        let a = frame.declare_parameter(name("a"), Type::Int, 0).unwrap();
        let b = frame.declare_parameter(name("b"), Type::Int, 1).unwrap();

        assert_eq!(a.fp_offset, 8);
        assert_eq!(b.fp_offset, 12);
    }

    #[test]
    fn locals_grow_downward_from_the_frame_pointer() {
        let mut frame = Frame::new();
        frame.begin_scope();

        frame.declare_parameter(name("a"), Type::Int, 0).unwrap();
        frame.declare_parameter(name("b"), Type::Int, 1).unwrap();
        let x = frame.declare_local(name("x"), Type::Int).unwrap();

        // Two parameters consumed _t0 and _t1, so the first local is _t2
        // at -4 * (2 + 1)
        assert_eq!(x.ir_name, "_t2");
        assert_eq!(x.fp_offset, -12);
        assert_eq!(frame.fp_offset("_t2"), Some(-12));
    }

    #[test]
    fn inner_scopes_shadow_and_unwind() {
        let mut frame = Frame::new();
        frame.begin_scope();
        let outer = frame.declare_local(name("x"), Type::Int).unwrap();

        frame.begin_scope();
        let inner = frame.declare_local(name("x"), Type::Bool).unwrap();
        assert_eq!(frame.resolve(name("x")).unwrap().ir_name, inner.ir_name);

        frame.end_scope();
        assert_eq!(frame.resolve(name("x")).unwrap().ir_name, outer.ir_name);
    }

    #[test]
    fn redeclaration_in_the_same_scope_is_rejected() {
        let mut frame = Frame::new();
        frame.begin_scope();

        assert!(frame.declare_local(name("x"), Type::Int).is_some());
        assert!(frame.declare_local(name("x"), Type::Int).is_none());
    }

    #[test]
    fn every_slot_fits_under_the_reserved_frame_size() {
        let mut frame = Frame::new();
        frame.begin_scope();

        for _ in 0..5 {
            frame.new_temp();
        }

        // Deepest slot is -4 * temps_consumed
        assert_eq!(frame.temps_consumed(), 5);
        assert_eq!(frame.fp_offset("_t4"), Some(-20));
    }
}
