//! Machine half of the pipeline. The optimized quads of each unit are
//! lowered to an assembly listing, the built-in assembler turns the
//! listing into an ELF32 relocatable, and the linker merges every
//! relocatable into one executable image.

pub mod assembler;
pub mod elf;
pub mod linker;
pub mod targets;
