use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use kl_compiler::{preprocess, CompileCtx};
use kl_types::TypeCheckMode;

/// Compiles KL source files into textual assembly, one `.out` file per input.
#[derive(Parser, Debug)]
#[command(name = "klc", version, about)]
struct Args {
    /// KL source files to compile.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Emit `; >>> path:line | source` annotations above each line's code.
    #[arg(long, action = clap::ArgAction::SetTrue, overrides_with = "no_comment")]
    comment: bool,

    /// Suppress `--comment` annotations (the default).
    #[arg(long, action = clap::ArgAction::SetTrue, overrides_with = "comment")]
    no_comment: bool,

    /// How strictly binary-operator and store operand types are reconciled.
    #[arg(long, value_enum, default_value = "loose")]
    type_checking: TypeCheckModeArg,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum TypeCheckModeArg {
    Strict,
    Loose,
    Off,
}

impl From<TypeCheckModeArg> for TypeCheckMode {
    fn from(value: TypeCheckModeArg) -> Self {
        match value {
            TypeCheckModeArg::Strict => TypeCheckMode::Strict,
            TypeCheckModeArg::Loose => TypeCheckMode::Loose,
            TypeCheckModeArg::Off => TypeCheckMode::Off,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with_writer(std::io::stderr)
        .init();

    let type_checking = TypeCheckMode::from(args.type_checking);

    for path in &args.files {
        if let Err(()) = compile_one(path, args.comment, type_checking) {
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn compile_one(path: &PathBuf, comment: bool, type_checking: TypeCheckMode) -> Result<(), ()> {
    let display_path = path.display().to_string();
    let source = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("ERROR: {e} ({display_path})");
    })?;

    let ast = kl_syntax::parse(&source).map_err(|e| {
        report(&display_path, &source, e.span().line, e.span().column, &e.to_string());
    })?;
    let ast = preprocess(&ast).map_err(|e| {
        report(&display_path, &source, e.span().line, e.span().column, &e.to_string());
    })?;

    let mut ctx = CompileCtx::new(display_path.clone(), comment, type_checking);
    ctx.set_source(&source);
    let assembly = ctx.compile(&ast).map_err(|e| {
        report(&display_path, &source, e.span().line, e.span().column, &e.to_string());
    })?;

    let out_path = path.with_extension("out");
    std::fs::write(&out_path, assembly).map_err(|e| {
        eprintln!("ERROR: {e} ({})", out_path.display());
    })?;

    tracing::info!(path = %display_path, out = %out_path.display(), "compiled");
    Ok(())
}

fn report(path: &str, source: &str, line: u32, column: u32, message: &str) {
    eprintln!("ERROR: {message} ({path}:{line}:{column})");
    if let Some(src_line) = source.split('\n').nth(line.saturating_sub(1) as usize) {
        eprintln!("{src_line}");
        eprintln!("{}^", " ".repeat(column.saturating_sub(1) as usize));
    }
}
