//! The AST is flattened into three-address code here, with type checks
//! running inline during the lowering. The quads are then partitioned
//! into a control flow graph and cleaned up by a handful of
//! optimization passes before being handed to the code generator.

pub mod cfg;
pub mod frame;
pub mod optimization;
pub mod tac;
pub mod ty;
