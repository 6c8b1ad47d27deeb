//! CLI entrypoint for the FatELF glue tool.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fatelf_glue::{glue, merge_trees};

/// Glue per-architecture ELF binaries into a FatELF container.
#[derive(Debug, Parser)]
#[command(name = "fatelf-glue")]
#[command(about = "Glue per-architecture ELF binaries into a FatELF container")]
struct Cli {
    /// Merge directory trees recursively instead of gluing single files.
    #[arg(short = 'r')]
    recursive: bool,
    /// Output file, or output directory with -r.
    out: PathBuf,
    /// Input binaries, or source directories with -r.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn main() -> ExitCode {
    // Usage errors exit 1 like runtime errors do.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    let result = if cli.recursive {
        merge_trees(&cli.out, &cli.inputs)
    } else {
        glue(&cli.out, &cli.inputs)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fatelf-glue: {err}");
            ExitCode::FAILURE
        }
    }
}
