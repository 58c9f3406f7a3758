//! Stored-versus-recomputed checks
//!
//! Verification never fails a run. Inconsistencies become [`Finding`]s that
//! the report prints next to the values that produced them.

use crate::aggregate::CorpusSummary;
use crate::config::VerifyConfig;
use crate::record::{Decomposition, ProblemRecord, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a stored value relates to its recomputed counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agreement {
    Match,
    Mismatch,
    StoredOnly,
    CalculatedOnly,
    BothAbsent,
}

/// One stored value next to the value recomputed from counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub stored: Option<f64>,
    pub calculated: Option<f64>,
    pub agreement: Agreement,
}

impl Comparison {
    pub fn new(stored: Option<f64>, calculated: Option<f64>, tolerance: f64) -> Self {
        let agreement = match (stored, calculated) {
            (Some(s), Some(c)) if (s - c).abs() <= tolerance => Agreement::Match,
            (Some(_), Some(_)) => Agreement::Mismatch,
            (Some(_), None) => Agreement::StoredOnly,
            (None, Some(_)) => Agreement::CalculatedOnly,
            (None, None) => Agreement::BothAbsent,
        };
        Self {
            stored,
            calculated,
            agreement,
        }
    }

    pub fn is_mismatch(&self) -> bool {
        self.agreement == Agreement::Mismatch
    }
}

/// Structural inconsistency found in one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    SuccessesExceedAttempts {
        stage: Stage,
        attempts: u64,
        successes: u64,
    },
    MalformedCount {
        column: String,
        value: String,
    },
    RateMismatch {
        stage: Stage,
        stored: f64,
        calculated: f64,
    },
    UnbiasedPassAtKMismatch {
        k: u32,
        stored: f64,
        calculated: f64,
    },
    TaskSuccessMismatch {
        task_success: bool,
        first_test_success: bool,
    },
    DecompositionImbalance {
        sum: f64,
    },
    NegativeDecomposition {
        built_failed_test: f64,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::SuccessesExceedAttempts {
                stage,
                attempts,
                successes,
            } => write!(
                f,
                "{} successes ({}) exceed attempts ({})",
                stage, successes, attempts
            ),
            Finding::MalformedCount { column, value } => write!(
                f,
                "{} is not a whole non-negative number ({:?}), read as 0",
                column, value
            ),
            Finding::RateMismatch {
                stage,
                stored,
                calculated,
            } => write!(
                f,
                "{}_success_rate mismatch: stored {:.4}, calculated {:.4}",
                stage, stored, calculated
            ),
            Finding::UnbiasedPassAtKMismatch {
                k,
                stored,
                calculated,
            } => write!(
                f,
                "unbiased_pass_at_{} mismatch: stored {:.4}, calculated {:.4}",
                k, stored, calculated
            ),
            Finding::TaskSuccessMismatch {
                task_success,
                first_test_success,
            } => write!(
                f,
                "task_success ({}) differs from first_test_success ({})",
                u8::from(*task_success),
                u8::from(*first_test_success)
            ),
            Finding::DecompositionImbalance { sum } => {
                write!(f, "stage decomposition sums to {:.6}, not 1", sum)
            }
            Finding::NegativeDecomposition { built_failed_test } => write!(
                f,
                "test rate exceeds build rate (built_failed_test {:.4})",
                built_failed_test
            ),
        }
    }
}

/// Everything the report shows for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordReport {
    pub id: String,
    pub total_attempts: u64,
    pub rates: BTreeMap<Stage, Comparison>,
    pub first_success: BTreeMap<Stage, Option<bool>>,
    pub task_success: Option<bool>,
    pub empirical_pass_at_k: BTreeMap<u32, Option<f64>>,
    pub unbiased_pass_at_k: BTreeMap<u32, Comparison>,
    pub decomposition: Decomposition,
    pub findings: Vec<Finding>,
}

impl RecordReport {
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }
}

/// Compare every stored value of `record` with its recomputed value.
pub fn check_record(record: &ProblemRecord, config: &VerifyConfig) -> RecordReport {
    let mut findings: Vec<Finding> = record
        .malformed_counts
        .iter()
        .map(|m| Finding::MalformedCount {
            column: m.column.clone(),
            value: m.value.clone(),
        })
        .collect();

    let mut rates = BTreeMap::new();
    for stage in Stage::ALL {
        let counts = record.stage(stage);
        // a count read as 0 says nothing about successes vs attempts
        if !counts.is_consistent() && !record.has_malformed_counts(stage) {
            findings.push(Finding::SuccessesExceedAttempts {
                stage,
                attempts: counts.attempts,
                successes: counts.successes,
            });
        }

        let comparison = Comparison::new(
            counts.stored_rate,
            counts.calculated_rate(),
            config.rate_tolerance,
        );
        if let (Agreement::Mismatch, Some(stored), Some(calculated)) =
            (comparison.agreement, comparison.stored, comparison.calculated)
        {
            findings.push(Finding::RateMismatch {
                stage,
                stored,
                calculated,
            });
        }
        rates.insert(stage, comparison);
    }

    if let (Some(task_success), Some(first_test_success)) =
        (record.task_success, record.first_success.test)
    {
        if task_success != first_test_success {
            findings.push(Finding::TaskSuccessMismatch {
                task_success,
                first_test_success,
            });
        }
    }

    let mut unbiased_pass_at_k = BTreeMap::new();
    for (&k, &stored) in &record.unbiased_pass_at_k_stored {
        let calculated = record.unbiased_pass_at_k_calculated.get(&k).copied();
        let comparison = Comparison::new(Some(stored), calculated, config.pass_at_k_tolerance);
        if let (true, Some(calculated)) = (comparison.is_mismatch(), calculated) {
            findings.push(Finding::UnbiasedPassAtKMismatch {
                k,
                stored,
                calculated,
            });
        }
        unbiased_pass_at_k.insert(k, comparison);
    }

    let decomposition = record.decomposition();
    let sum = decomposition.sum();
    if (sum - 1.0).abs() > config.decomposition_tolerance {
        findings.push(Finding::DecompositionImbalance { sum });
    }
    if decomposition.built_failed_test < -config.decomposition_tolerance {
        findings.push(Finding::NegativeDecomposition {
            built_failed_test: decomposition.built_failed_test,
        });
    }

    RecordReport {
        id: record.id.clone(),
        total_attempts: record.total_attempts,
        rates,
        first_success: Stage::ALL
            .iter()
            .map(|&stage| (stage, record.first_success.get(stage)))
            .collect(),
        task_success: record.task_success,
        empirical_pass_at_k: record.empirical_pass_at_k.clone(),
        unbiased_pass_at_k,
        decomposition,
        findings,
    }
}

/// Inconsistency visible only at corpus level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryFinding {
    TaskSuccessRateDiscrepancy {
        first_test_success_rate: f64,
        task_success_rate: f64,
    },
    DecompositionMacroImbalance {
        sum: f64,
    },
}

impl fmt::Display for SummaryFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryFinding::TaskSuccessRateDiscrepancy {
                first_test_success_rate,
                task_success_rate,
            } => write!(
                f,
                "task_success_rate {:.4} differs from first_test_success_rate {:.4}",
                task_success_rate, first_test_success_rate
            ),
            SummaryFinding::DecompositionMacroImbalance { sum } => {
                write!(f, "macro stage decomposition sums to {:.6}, not 1", sum)
            }
        }
    }
}

/// Corpus-level consistency checks on a finalized summary.
pub fn check_summary(summary: &CorpusSummary, config: &VerifyConfig) -> Vec<SummaryFinding> {
    let mut findings = Vec::new();

    if let Some(gap) = summary.task_success_discrepancy() {
        if gap.abs() > config.task_success_tolerance {
            if let (Some(first_test_success_rate), Some(task_success_rate)) = (
                summary.first_attempt.test.value,
                summary.first_attempt.task_success.value,
            ) {
                findings.push(SummaryFinding::TaskSuccessRateDiscrepancy {
                    first_test_success_rate,
                    task_success_rate,
                });
            }
        }
    }

    if let Some(sum) = summary.decomposition.sum() {
        if (sum - 1.0).abs() > config.decomposition_tolerance {
            findings.push(SummaryFinding::DecompositionMacroImbalance { sum });
        }
    }

    findings
}
