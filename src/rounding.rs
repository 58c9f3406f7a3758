//! Rounding of corpus summary tables for publication
//!
//! pass@k columns keep their 0..1 scale and are rounded to two decimals.
//! Rate columns are converted to percentages with one decimal. Every other
//! column, and any cell that is empty or not a number, is copied unchanged.

use crate::error::{Result, VerifyError};
use crate::schema::{parse_k, EMPIRICAL_PREFIX, UNBIASED_PREFIX};
use std::path::{Path, PathBuf};
use tracing::info;

/// Rate columns converted to percentages
pub const RATE_COLUMNS: [&str; 11] = [
    "avg_generation_success_rate",
    "avg_build_success_rate",
    "avg_test_success_rate",
    "micro_generation_success_rate",
    "micro_build_success_rate",
    "micro_test_success_rate",
    "task_success_rate",
    "first_generation_success_rate",
    "first_build_success_rate",
    "first_test_success_rate",
    "pass_given_build_rate",
];

/// How one column is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRounding {
    /// Round to 2 decimals
    PassAtK,
    /// Scale by 100, round to 1 decimal
    Percentage,
    Keep,
}

impl ColumnRounding {
    pub fn for_header(header: &str) -> Self {
        let header = header.trim();
        if parse_k(header, EMPIRICAL_PREFIX).is_some() || parse_k(header, UNBIASED_PREFIX).is_some()
        {
            ColumnRounding::PassAtK
        } else if RATE_COLUMNS.contains(&header) {
            ColumnRounding::Percentage
        } else {
            ColumnRounding::Keep
        }
    }

    /// Rewrite one cell; cells that do not parse are returned as-is.
    pub fn apply(&self, cell: &str) -> String {
        let value = match cell.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => return cell.to_string(),
        };
        match self {
            ColumnRounding::PassAtK => format_decimal(round_to(value, 2)),
            ColumnRounding::Percentage => format_decimal(round_to(value * 100.0, 1)),
            ColumnRounding::Keep => cell.to_string(),
        }
    }
}

/// Halves go to the even neighbour (`0.125` -> `0.12`).
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    let rounded = (value * scale).round_ties_even() / scale;
    // avoid printing "-0.0"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Shortest representation, always with a decimal point (`1.0`, `83.3`).
fn format_decimal(value: f64) -> String {
    let s = value.to_string();
    if s.contains('.') {
        s
    } else {
        format!("{}.0", s)
    }
}

/// `results/summary.csv` -> `results/summary_rounded.csv`
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "summary".to_string());
    input.with_file_name(format!("{}_rounded.csv", stem))
}

/// Round every recognized column of `input` into `output`; returns rows written.
pub fn round_summary_file(input: &Path, output: &Path) -> Result<usize> {
    let file = std::fs::File::open(input).map_err(|e| VerifyError::io(input, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| VerifyError::csv(input, 1, e))?
        .clone();
    let rules: Vec<ColumnRounding> = headers.iter().map(ColumnRounding::for_header).collect();

    let mut writer = csv::Writer::from_path(output).map_err(|e| VerifyError::csv(output, 0, e))?;
    writer
        .write_record(&headers)
        .map_err(|e| VerifyError::csv(output, 1, e))?;

    let mut rows = 0usize;
    for (i, record) in reader.records().enumerate() {
        let line = i as u64 + 2;
        let record = record.map_err(|e| VerifyError::csv(input, line, e))?;
        let rounded: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                rules
                    .get(col)
                    .copied()
                    .unwrap_or(ColumnRounding::Keep)
                    .apply(cell)
            })
            .collect();
        writer
            .write_record(&rounded)
            .map_err(|e| VerifyError::csv(output, line, e))?;
        rows += 1;
    }
    writer.flush().map_err(|e| VerifyError::io(output, e))?;

    info!(
        "Rounded {} row(s) from {} into {}",
        rows,
        input.display(),
        output.display()
    );
    Ok(rows)
}
