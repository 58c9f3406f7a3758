//! Rounds a corpus summary table for publication.

use anyhow::{Context, Result};
use bench_verify::rounding::{default_output_path, round_summary_file};
use bench_verify::style::print_error;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "bench-round")]
#[command(about = "Round pass@k to 2 decimals and rates to percentages with 1 decimal")]
struct Args {
    /// Corpus summary CSV, one row per model
    #[arg(value_name = "PATH")]
    input: PathBuf,

    /// Output path (default: <input stem>_rounded.csv next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bench_verify=info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    let rows = round_summary_file(&args.input, &output)
        .with_context(|| format!("Failed to round {}", args.input.display()))?;
    println!("Saved {} rounded row(s) to {}", rows, output.display());
    Ok(())
}
