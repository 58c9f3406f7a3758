//! Benchmark Verification for code-generation evaluations
//!
//! Each benchmark problem is attempted several times across three stages
//! (generation, build, test). This crate reads the per-problem table,
//! recomputes every derived statistic from raw counts, cross-checks them
//! against the stored values and rolls the problems up into corpus-level
//! summaries.
//!
//! ## Module Structure
//!
//! - `schema`: pass@k column discovery from the header row
//! - `record`: per-problem record parsing
//! - `passk`: unbiased pass@k estimator
//! - `aggregate`: macro, micro, first-attempt and pass@k summaries
//! - `verify`: stored-versus-recomputed findings
//! - `report`: human-readable rendering
//! - `pipeline`: streaming verification of a CSV file
//! - `rounding`: publication rounding of summary tables
//! - `config`: tolerances and report options

pub mod aggregate;
pub mod config;
pub mod error;
pub mod passk;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod rounding;
pub mod schema;
pub mod style;
pub mod verify;

pub use aggregate::{Aggregator, CorpusSummary, MacroMean, StageSummary};
pub use config::VerifyConfig;
pub use error::{Result, VerifyError};
pub use passk::unbiased_pass_at_k;
pub use pipeline::{write_summary_csv, write_summary_json, VerificationOutcome, Verifier};
pub use record::{MalformedCount, ProblemRecord, Stage, StageCounts};
pub use report::{ReportSink, TextReport};
pub use schema::ColumnSchema;
pub use verify::{check_record, check_summary, Finding, RecordReport, SummaryFinding};
