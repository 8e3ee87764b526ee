//! Command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stacheforge::compiler::loader::DirLoader;
use stacheforge::compiler::{diagnostics::Diagnostic, parser};
use stacheforge::driver::Driver;
use stacheforge::manifest::Manifest;

#[derive(Parser)]
#[command(name = "stacheforge")]
#[command(version, about = "Compile Mustache templates into Rust renderers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize and parse a template, reporting syntax diagnostics
    Check {
        /// Template file to check
        file: PathBuf,
    },

    /// Compile every model in a manifest to renderer sources
    Build {
        /// TOML manifest declaring types and models
        #[arg(long)]
        manifest: PathBuf,

        /// Root directory for template and partial lookup
        #[arg(long, default_value = "templates")]
        templates: PathBuf,

        /// Directory the generated sources are written to
        #[arg(long, default_value = "generated")]
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { file } => check(&file),
        Commands::Build { manifest, templates, out } => build(&manifest, &templates, &out),
    }
}

fn check(file: &PathBuf) -> ExitCode {
    let label = file.display().to_string();
    let source = match std::fs::read_to_string(file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{}", Diagnostic::error(&label, None, format!("cannot read template: {e}")));
            return ExitCode::FAILURE;
        }
    };
    match parser::parse(&source) {
        Ok(_) => {
            println!("{label}: ok");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", Diagnostic::from_compile_error(&label, &e));
            ExitCode::FAILURE
        }
    }
}

fn build(manifest_path: &PathBuf, templates: &PathBuf, out: &PathBuf) -> ExitCode {
    let manifest = match Manifest::from_path(manifest_path) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("{}", Diagnostic::error(manifest_path.display().to_string(), None, e.to_string()));
            return ExitCode::FAILURE;
        }
    };
    let (catalog, units) = match manifest.into_compilation(&manifest_path.display().to_string()) {
        Ok(compilation) => compilation,
        Err(e) => {
            eprintln!("{}", Diagnostic::error(manifest_path.display().to_string(), None, e.to_string()));
            return ExitCode::FAILURE;
        }
    };

    let resources = DirLoader::new(templates);
    let report = Driver::new(catalog, out).run(&units, &resources);
    for diagnostic in &report.diagnostics {
        eprintln!("{diagnostic}");
    }
    if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
