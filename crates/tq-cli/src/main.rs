//! `tq` CLI — query TOON documents with jq-style expressions.
//!
//! ## Usage
//!
//! ```sh
//! # Query a file
//! tq '.users[].email' data.toon
//!
//! # Query stdin ('-' or omit the file argument)
//! cat data.toon | tq '.items[].price'
//!
//! # Show execution time and result count on stderr
//! tq -b 'group_by(.team) | map(length)' data.toon
//! ```
//!
//! Each result is written to stdout as TOON, one per line. Exit code is 0
//! on success and 1 on any error (usage, read, parse, evaluate), with the
//! message on stderr.

use std::io::Read;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "tq",
    version,
    about = "Query TOON data with jq-style expressions",
    after_help = "Examples:\n  tq '.name' data.toon\n  tq '.users[].email' data.toon\n  cat data.toon | tq '.items[].price'"
)]
struct Cli {
    /// Query expression (e.g. '.users[].email')
    expression: String,

    /// Input file (TOON format). Use '-' or omit for stdin
    file: Option<String>,

    /// Benchmark mode: show execution time and result count on stderr
    #[arg(short, long)]
    benchmark: bool,
}

fn main() -> Result<()> {
    // Usage errors exit 1 like every other failure; clap's default of 2
    // would leak through `Cli::parse`.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e)
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            print!("{}", e);
            return Ok(());
        }
        Err(e) => {
            eprint!("{}", e);
            std::process::exit(1);
        }
    };

    let data = match cli.file.as_deref() {
        None | Some("-") => read_stdin()?,
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path))?,
    };

    let start = Instant::now();
    let results = tq_core::query(&cli.expression, &data)?;
    let elapsed = start.elapsed();

    for result in &results {
        println!("{}", result);
    }

    if cli.benchmark {
        eprintln!();
        eprintln!("Execution time: {:.3} ms", elapsed.as_secs_f64() * 1000.0);
        eprintln!("Results: {}", results.len());
    }

    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read from stdin")?;
    Ok(buf)
}
