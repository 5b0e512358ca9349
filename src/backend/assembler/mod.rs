//! Textual x86-32 assembler.
//!
//! Three stages: `parser` turns the listing into statements, `encoder`
//! turns statements into machine code with every label reference
//! patched or deferred, and `object` wraps the result in an ELF32
//! relocatable. Errors land in the shared diagnostics store; a listing
//! that produced any yields no object.

pub mod encoder;
pub mod object;
pub mod parser;

use crate::diagnostics::Diagnostics;

/// Assembles one listing into a relocatable object. `source_name` is
/// recorded in the object's file symbol.
pub fn assemble(source: &str, source_name: &str, diagnostics: &mut Diagnostics) -> Option<Vec<u8>> {
    let statements = parser::Parser::parse(source, diagnostics);
    let assembly = encoder::Encoder::encode(&statements, diagnostics);

    if diagnostics.has_errors() {
        return None;
    }

    Some(object::write_object(&assembly, source_name))
}
