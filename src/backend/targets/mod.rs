use crate::middle::{
    cfg::Cfg,
    tac::{Session, ast_lowering::LoweredUnit},
};

mod x86_linux;

/// Turns one optimized unit into an assembly listing for the built-in
/// assembler. The session supplies fresh jump labels, so listing labels
/// never collide with the ones IR lowering already spent.
pub trait CodeGenerator {
    fn generate_listing(&self, unit: &LoweredUnit, cfg: &Cfg, session: &mut Session) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Target {
    #[default]
    X86Linux,
}

impl Target {
    pub fn get_code_generator(self) -> impl CodeGenerator {
        match self {
            Target::X86Linux => x86_linux::CodeGeneratorX86Linux,
        }
    }
}
