//! Benchmark Verification CLI
//!
//! Recomputes and cross-checks the statistics of one per-problem results
//! table, then prints the corpus summary.

use anyhow::{Context, Result};
use bench_verify::style::{print_error, Style};
use bench_verify::{write_summary_csv, write_summary_json, TextReport, Verifier, VerifyConfig};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bench-verify")]
#[command(about = "Verify and aggregate per-problem benchmark statistics")]
struct Args {
    /// Per-problem results CSV
    #[arg(value_name = "PATH")]
    input: PathBuf,

    /// TOML file with comparison tolerances
    #[arg(short, long, env = "BENCH_VERIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Also write the one-row corpus summary table here
    #[arg(long, value_name = "FILE")]
    summary_csv: Option<PathBuf>,

    /// Also write the corpus summary as JSON here
    #[arg(long, value_name = "FILE")]
    summary_json: Option<PathBuf>,

    /// Exit with status 3 when any finding was reported
    #[arg(long)]
    strict: bool,
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
        Ok(findings) if args.strict && findings > 0 => ExitCode::from(3),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<usize> {
    let config = match &args.config {
        Some(path) => VerifyConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => VerifyConfig::default(),
    };

    let stdout = std::io::stdout().lock();
    let mut report =
        TextReport::new(stdout, Style::for_stdout()).show_matching(config.show_matching);

    let outcome = Verifier::new(config)
        .verify_path(&args.input, &mut report)
        .with_context(|| format!("Failed to verify {}", args.input.display()))?;

    if let Some(path) = &args.summary_csv {
        write_summary_csv(path, &model_label(&args.input), &outcome.summary)?;
    }
    if let Some(path) = &args.summary_json {
        write_summary_json(path, &outcome.summary)?;
    }

    info!("{} finding(s) in total", outcome.total_findings());
    Ok(outcome.total_findings())
}

/// `results/gpt-x_problems.csv` -> `gpt-x_problems`
fn model_label(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
