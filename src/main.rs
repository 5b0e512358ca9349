use std::{collections::BTreeSet, path::PathBuf};

use clap::{CommandFactory, Parser as ClapParser, error::ErrorKind};
use colored::Colorize;

use crate::{
    backend::{
        assembler,
        linker::{self, ObjectFile},
        targets::{CodeGenerator, Target},
    },
    diagnostics::Diagnostics,
    frontend::{SourceFile, SourceFileOrigin, intern::InternedSymbol, parser::Parser},
    middle::{
        cfg::Cfg,
        optimization,
        tac::{
            Session,
            ast_lowering::{AstLowering, SignatureTable},
            pretty_print,
        },
    },
};

mod backend;
mod diagnostics;
mod frontend;
mod index;
mod middle;

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Source files compiled and linked together as one program
    source_files: Vec<PathBuf>,

    /// Path of the linked executable
    #[arg(short, long, default_value = "out.exe")]
    output: PathBuf,

    /// Code generation target
    #[arg(long, value_enum, default_value_t = Target::default())]
    target: Target,

    /// Print each unit's optimized IR
    #[arg(long)]
    dump_ir: bool,

    /// Print each unit's assembly listing
    #[arg(long)]
    dump_asm: bool,
}

fn main() {
    let args = Args::parse();

    if args.source_files.is_empty() {
        Args::command()
            .error(ErrorKind::MissingRequiredArgument, "Missing source files!")
            .exit();
    }

    for source_file in &args.source_files {
        if !source_file.exists() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Source file '{}' does not exist!", source_file.display()),
                )
                .exit()
        }

        if !source_file.is_file() {
            Args::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("Input path '{}' is not a file!", source_file.display()),
                )
                .exit()
        }
    }

    /* Read in source files */

    let source_files = args
        .source_files
        .iter()
        .map(|path| {
            let contents = std::fs::read_to_string(path)
                .expect("Failed to read input file (or invalid UTF-8)");

            SourceFile {
                contents,
                origin: SourceFileOrigin::File(path.clone()),
            }
        })
        .collect::<Vec<_>>();

    /* Parse every module up front; a syntax error anywhere stops the run */

    let modules = source_files
        .iter()
        .map(Parser::parse_module)
        .collect::<Vec<_>>();

    let mut diagnostics: Vec<Diagnostics> = modules.iter().map(|_| Diagnostics::new()).collect();

    // Calls and imports resolve across units, so both tables span the
    // whole compilation.
    let signatures = SignatureTable::collect(&modules, &mut diagnostics);
    let module_names = args
        .source_files
        .iter()
        .map(|path| {
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy())
                .unwrap_or_default();
            InternedSymbol::new(&stem)
        })
        .collect::<BTreeSet<_>>();

    let mut session = Session::new();
    let generator = args.target.get_code_generator();
    let mut objects = Vec::new();

    for ((module, diagnostics), path) in modules
        .iter()
        .zip(diagnostics.iter_mut())
        .zip(&args.source_files)
    {
        let mut unit =
            AstLowering::lower_module(module, &signatures, &module_names, &mut session, diagnostics);

        let mut cfg = Cfg::build(&unit.tac);
        optimization::perform_optimizations(&mut unit.tac, &mut cfg);

        if args.dump_ir {
            println!("{}", format!("; {}", module.source_file.origin).white());
            pretty_print::print_tac(&unit.tac);
        }

        // A unit that failed its checks still went through lowering so
        // every error is on record, but it produces no artifacts.
        if diagnostics.has_errors() {
            continue;
        }

        let listing = generator.generate_listing(&unit, &cfg, &mut session);

        if args.dump_asm {
            println!("{listing}");
        }

        let source_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(object) = assembler::assemble(&listing, &source_name, diagnostics) else {
            continue;
        };

        let object_path = path.with_extension("o");
        std::fs::write(&object_path, &object).expect("Failed to write object file");

        objects.push(ObjectFile {
            name: source_name,
            data: object,
        });
    }

    let mut error_count = 0;
    for (module, diagnostics) in modules.iter().zip(&diagnostics) {
        diagnostics.print_all(&module.source_file.origin);
        error_count += diagnostics.error_count();
    }

    if error_count > 0 {
        std::process::exit(1);
    }

    match linker::link(&objects) {
        Ok(image) => {
            std::fs::write(&args.output, &image).expect("Failed to write executable");

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&args.output, std::fs::Permissions::from_mode(0o755))
                    .expect("Failed to mark executable");
            }
        }
        Err(error) => {
            for message in &error.messages {
                eprintln!("{}: {message}", "error".red());
            }
            std::process::exit(1);
        }
    }
}
