//! Command-line front end for the Quill interpreter: `run` a source file
//! through the evaluator, or `check` it for diagnostics without running it.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use quill_core::Severity;
use std::io;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "quillc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Quill interpreter front end", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and interpret a .ql source file
    Run {
        /// Input source file
        input: PathBuf,

        /// Log the parsed tree before evaluating
        #[arg(long)]
        print_tree: bool,
    },

    /// Parse a .ql source file and report diagnostics, without running it
    Check {
        /// Input source file
        input: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { input, print_tree } => run_file(&input, print_tree),
        Commands::Check { input } => check_file(&input),
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "quillc", &mut io::stdout());
}

fn run_file(input: &PathBuf, print_tree: bool) {
    let source = match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error reading {}: {e}", input.display());
            process::exit(1);
        }
    };

    let mut ast = quill_runtime::Ast::new(None);
    match ast.interpret(&source, true, print_tree) {
        Ok(Some(value)) => println!("{value}"),
        Ok(None) => {}
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

fn check_file(input: &PathBuf) {
    let source = match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error reading {}: {e}", input.display());
            process::exit(1);
        }
    };

    let (_program, diagnostics) = quill_compiler::parse(&source);
    if diagnostics.is_empty() {
        println!("no diagnostics");
        return;
    }
    print!("{}", quill_core::format_diagnostics(&diagnostics));
    println!();
    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    if has_errors {
        process::exit(1);
    }
}
