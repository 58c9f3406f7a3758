//! Streaming verification of one problems table
//!
//! Rows are parsed, checked, reported and folded one at a time in input
//! order; only the aggregator's running sums outlive a row.

use crate::aggregate::{Aggregator, CorpusSummary};
use crate::config::VerifyConfig;
use crate::error::{Result, VerifyError};
use crate::record::{ProblemRecord, Row};
use crate::report::ReportSink;
use crate::schema::ColumnSchema;
use crate::verify::{check_record, check_summary, SummaryFinding};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of verifying one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub summary: CorpusSummary,
    /// Problems with at least one finding
    pub records_with_findings: usize,
    pub record_findings: usize,
    pub summary_findings: Vec<SummaryFinding>,
}

impl VerificationOutcome {
    pub fn total_findings(&self) -> usize {
        self.record_findings + self.summary_findings.len()
    }
}

/// Verifier bound to one configuration
pub struct Verifier {
    config: VerifyConfig,
}

impl Verifier {
    pub fn new(config: VerifyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    /// Verify a CSV file.
    pub fn verify_path(&self, path: &Path, sink: &mut impl ReportSink) -> Result<VerificationOutcome> {
        let file = std::fs::File::open(path).map_err(|e| VerifyError::io(path, e))?;
        info!("Verifying {}", path.display());
        self.verify_reader(file, path, sink)
    }

    /// Verify CSV text from any reader; `source` names it in errors.
    pub fn verify_reader<R: Read>(
        &self,
        reader: R,
        source: &Path,
        sink: &mut impl ReportSink,
    ) -> Result<VerificationOutcome> {
        let source: PathBuf = source.to_path_buf();
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv
            .headers()
            .map_err(|e| VerifyError::csv(&source, 1, e))?
            .clone();
        let schema = ColumnSchema::from_headers(headers.iter());
        debug!(
            "Discovered pass@k columns: empirical {:?}, unbiased {:?}",
            schema.empirical_ks, schema.unbiased_ks
        );
        for required in ["problem_id", "test_attempts", "test_successes"] {
            if !schema.has_column(required) {
                warn!("Column '{}' missing from {}", required, source.display());
            }
        }

        let mut aggregator = Aggregator::new(&schema);
        let mut records_with_findings = 0;
        let mut record_findings = 0;

        let mut raw = csv::StringRecord::new();
        let mut line = 1u64;
        loop {
            line += 1;
            let more = csv
                .read_record(&mut raw)
                .map_err(|e| VerifyError::csv(&source, line, e))?;
            if !more {
                break;
            }

            let record = ProblemRecord::parse(
                &Row {
                    schema: &schema,
                    record: &raw,
                },
                &schema,
            );
            let report = check_record(&record, &self.config);
            debug!("Problem {}: {} finding(s)", record.id, report.findings.len());
            for finding in &report.findings {
                warn!("Problem {}: {}", record.id, finding);
            }
            if report.has_findings() {
                records_with_findings += 1;
                record_findings += report.findings.len();
            }

            sink.record(&report)?;
            aggregator.fold(&record);
        }

        let summary = aggregator.finalize();
        let summary_findings = check_summary(&summary, &self.config);
        for finding in &summary_findings {
            warn!("Corpus: {}", finding);
        }
        sink.summary(&summary, &summary_findings)?;

        info!(
            "Verified {} problem(s): {} finding(s) in {} problem(s), {} corpus finding(s)",
            summary.problems,
            record_findings,
            records_with_findings,
            summary_findings.len()
        );

        Ok(VerificationOutcome {
            summary,
            records_with_findings,
            record_findings,
            summary_findings,
        })
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(VerifyConfig::default())
    }
}

/// Write the one-row corpus summary table read by the rounding step.
pub fn write_summary_csv(path: &Path, label: &str, summary: &CorpusSummary) -> Result<()> {
    let row = summary.summary_row(label);
    let mut writer = csv::Writer::from_path(path).map_err(|e| VerifyError::csv(path, 0, e))?;
    writer
        .write_record(row.iter().map(|(name, _)| name.as_str()))
        .map_err(|e| VerifyError::csv(path, 1, e))?;
    writer
        .write_record(row.iter().map(|(_, value)| value.as_str()))
        .map_err(|e| VerifyError::csv(path, 2, e))?;
    writer.flush().map_err(|e| VerifyError::io(path, e))?;
    info!("Wrote corpus summary row to {}", path.display());
    Ok(())
}

/// Write the corpus summary as pretty JSON.
pub fn write_summary_json(path: &Path, summary: &CorpusSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json).map_err(|e| VerifyError::io(path, e))?;
    info!("Wrote corpus summary JSON to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::RecordReport;
    use std::io;

    #[derive(Default)]
    struct CollectingSink {
        records: Vec<RecordReport>,
        summaries: usize,
    }

    impl ReportSink for CollectingSink {
        fn record(&mut self, report: &RecordReport) -> io::Result<()> {
            self.records.push(report.clone());
            Ok(())
        }

        fn summary(&mut self, _: &CorpusSummary, _: &[SummaryFinding]) -> io::Result<()> {
            self.summaries += 1;
            Ok(())
        }
    }

    fn verify(text: &str) -> (VerificationOutcome, CollectingSink) {
        let mut sink = CollectingSink::default();
        let outcome = Verifier::default()
            .verify_reader(text.as_bytes(), Path::new("inline.csv"), &mut sink)
            .unwrap();
        (outcome, sink)
    }

    #[test]
    fn test_records_reported_in_input_order() {
        let (outcome, sink) = verify(
            "problem_id,test_attempts,test_successes\n\
             b,4,1\n\
             a,4,4\n\
             c,2,0\n",
        );
        let ids: Vec<&str> = sink.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(sink.summaries, 1);
        assert_eq!(outcome.summary.problems, 3);
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let (outcome, _) = verify(
            "problem_id,build_attempts,build_successes,unbiased_pass_at_1\n\
             p1,4\n\
             p2,4,4,1.0\n",
        );
        assert_eq!(outcome.summary.problems, 2);
        assert_eq!(outcome.summary.build.macro_rate.value, Some(0.5));
        assert_eq!(outcome.summary.unbiased_pass_at_k[&1].stored.value, Some(0.5));
    }

    #[test]
    fn test_findings_counted() {
        let (outcome, _) = verify(
            "problem_id,build_attempts,build_successes,build_success_rate,first_test_success,task_success\n\
             p1,4,3,0.80,1,0\n\
             p2,4,3,0.75,1,1\n",
        );
        assert_eq!(outcome.records_with_findings, 1);
        assert_eq!(outcome.record_findings, 2);
        assert_eq!(outcome.summary_findings.len(), 1);
        assert_eq!(outcome.total_findings(), 3);
    }

    #[test]
    fn test_header_only_input() {
        let (outcome, sink) = verify("problem_id,test_attempts,test_successes\n");
        assert!(sink.records.is_empty());
        assert_eq!(outcome.summary.problems, 0);
        assert_eq!(outcome.summary.test.micro_rate, None);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut sink = CollectingSink::default();
        let err = Verifier::default()
            .verify_path(Path::new("/nonexistent/problems.csv"), &mut sink)
            .unwrap_err();
        assert!(matches!(err, VerifyError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/problems.csv"));
    }

    #[test]
    fn test_invalid_utf8_is_csv_error() {
        let mut sink = CollectingSink::default();
        let bytes: &[u8] = b"problem_id,test_attempts\n\xff\xfe,4\n";
        let err = Verifier::default()
            .verify_reader(bytes, Path::new("bad.csv"), &mut sink)
            .unwrap_err();
        assert!(matches!(err, VerifyError::Csv { row: 2, .. }));
    }
}
