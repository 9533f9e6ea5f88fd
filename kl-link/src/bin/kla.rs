use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use kl_link::Linker;

/// Assembles and links KL assembly-text files into one flat binary.
///
/// Positional arguments are either source file paths or `@RELOC:<addr>`
/// tokens; a `@RELOC:` token re-bases every file assembled after it to
/// start at `<addr>` (decimal, or `0x`/`0b`/`0o`-prefixed), without
/// needing a matching directive inside the file itself.
#[derive(Parser, Debug)]
#[command(name = "kla", version, about)]
struct Args {
    /// Source files and `@RELOC:<addr>` tokens, in link order.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Path to write the linked binary to.
    #[arg(short, long)]
    output: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
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

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("ERROR: {message}");
            ExitCode::FAILURE
        }
    }
}

/// Assembles every input in order, continuing past a failing file so a
/// single run surfaces every file's errors rather than just the first.
fn run(args: &Args) -> Result<(), String> {
    let mut linker = Linker::new();
    let mut errors: Vec<String> = Vec::new();

    for input in &args.inputs {
        if let Some(hex) = input.strip_prefix("@RELOC:") {
            match kl_link::parse_cli_reloc(hex) {
                Some(origin) => linker.set_origin(origin),
                None => errors.push(format!("malformed @RELOC token '{input}'")),
            }
            continue;
        }

        let path = PathBuf::from(input);
        match std::fs::read_to_string(&path).map_err(|e| format!("{e} ({input})")) {
            Ok(source) => {
                if let Err(e) = linker.add_unit(input, &source) {
                    errors.push(format!("{e}"));
                }
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(errors.join("; "));
    }

    let code = linker.finish().map_err(|e| format!("{e}"))?;
    std::fs::write(&args.output, &code).map_err(|e| format!("{e} ({})", args.output.display()))?;

    tracing::info!(output = %args.output.display(), bytes = code.len(), "linked");
    Ok(())
}
