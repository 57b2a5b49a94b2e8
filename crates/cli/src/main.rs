#![forbid(unsafe_code)]

use clap::{Parser as CliParser, Subcommand};
use csgen::generate_csharp;
use frontend::analyze::analyze;
use frontend::diag::Diagnostic;
use frontend::parser::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Message(String),
    /// Diagnostics were already streamed to stderr.
    #[error("compilation failed")]
    CompileFailed,
}

#[derive(CliParser, Debug)]
#[command(name = "gplc", version, about = "GP-λ to C# compiler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a GP-λ source file to a C# source file
    Compile {
        /// The source file
        #[arg(long)]
        input: PathBuf,
        /// Output path (defaults to the input with a .cs extension)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print per-stage progress to stdout
        #[arg(long)]
        verbose: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::CompileFailed) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Compile {
            input,
            output,
            verbose,
        } => compile(&input, output.as_deref(), verbose),
    }
}

fn compile(input: &Path, output: Option<&Path>, verbose: bool) -> Result<(), CliError> {
    let source = fs::read_to_string(input)
        .map_err(|e| CliError::Message(format!("failed to read {}: {e}", input.display())))?;
    let out_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("cs"));

    if verbose {
        println!("parsing {}", input.display());
    }
    let mut parser = match Parser::new(&source) {
        Ok(parser) => parser,
        Err(e) => return fail(vec![e.to_diagnostic()]),
    };
    let mut program = match parser.parse_program() {
        Ok(program) => program,
        Err(e) => return fail(vec![e.to_diagnostic()]),
    };

    if verbose {
        println!("analyzing {} declaration(s)", program.decls.len());
    }
    let analysis = analyze(&mut program);
    if verbose {
        for warning in &analysis.warnings {
            println!("warning: [{}] {}", warning.pos, warning.message);
        }
    }
    if analysis.has_errors() {
        return fail(analysis.into_diagnostics());
    }

    if verbose {
        println!("emitting C#");
    }
    let csharp = match generate_csharp(&program) {
        Ok(csharp) => csharp,
        Err(e) => {
            return match e.to_diagnostic() {
                Some(diag) => fail(vec![diag]),
                None => Err(CliError::Message(format!("internal compiler error: {e}"))),
            };
        }
    };

    // generation is complete before the first byte is written, so the
    // output file is never partial
    fs::write(&out_path, csharp)
        .map_err(|e| CliError::Message(format!("failed to write {}: {e}", out_path.display())))?;
    if verbose {
        println!("wrote {}", out_path.display());
    }
    Ok(())
}

fn fail(diagnostics: Vec<Diagnostic>) -> Result<(), CliError> {
    for diag in &diagnostics {
        eprintln!("{diag}");
    }
    Err(CliError::CompileFailed)
}
