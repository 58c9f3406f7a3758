//! Corpus-level aggregation
//!
//! [`Aggregator`] folds [`ProblemRecord`]s into running sums and counts and is
//! consumed by [`Aggregator::finalize`], which produces the [`CorpusSummary`].
//! Every accumulator is a sum or a count, so shards folded separately can be
//! combined with [`Aggregator::merge`] before finalizing.

use crate::record::{ProblemRecord, Stage};
use crate::schema::{empirical_column, unbiased_column, ColumnSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running mean over present values only
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    /// Absent values contribute to neither the sum nor the count.
    pub fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    pub fn merge(&mut self, other: &MeanAccumulator) {
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count > 0 {
            Some(self.sum / self.count as f64)
        } else {
            None
        }
    }

    fn finish(&self) -> MacroMean {
        MacroMean {
            value: self.mean(),
            count: self.count,
        }
    }
}

/// Pooled successes over pooled attempts
///
/// Sums saturate at `u64::MAX`; once either one has overflowed, the pooled
/// rate is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PooledCounts {
    pub attempts: u64,
    pub successes: u64,
    pub overflowed: bool,
}

impl PooledCounts {
    pub fn add(&mut self, attempts: u64, successes: u64) {
        let pooled_attempts = self.attempts.checked_add(attempts);
        let pooled_successes = self.successes.checked_add(successes);
        self.overflowed |= pooled_attempts.is_none() || pooled_successes.is_none();
        self.attempts = pooled_attempts.unwrap_or(u64::MAX);
        self.successes = pooled_successes.unwrap_or(u64::MAX);
    }

    pub fn merge(&mut self, other: &PooledCounts) {
        self.add(other.attempts, other.successes);
        self.overflowed |= other.overflowed;
    }

    /// Pooled successes, `None` after an overflow
    pub fn exact_successes(&self) -> Option<u64> {
        (!self.overflowed).then_some(self.successes)
    }

    pub fn rate(&self) -> Option<f64> {
        if self.overflowed {
            return None;
        }
        ratio(self.successes, self.attempts)
    }
}

fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator > 0 {
        Some(numerator as f64 / denominator as f64)
    } else {
        None
    }
}

// ============================================================================
// Summary types
// ============================================================================

/// Mean over the problems where a metric was present
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroMean {
    /// `None` when no problem carried the metric
    pub value: Option<f64>,
    /// Number of problems behind the mean
    pub count: usize,
}

/// Macro and micro view of one stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    /// Mean of per-problem calculated rates
    pub macro_rate: MacroMean,
    /// Pooled successes / pooled attempts
    pub micro_rate: Option<f64>,
    pub attempts: u64,
    pub successes: u64,
}

/// First-attempt indicator means
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FirstAttemptSummary {
    pub generation: MacroMean,
    pub build: MacroMean,
    pub test: MacroMean,
    pub task_success: MacroMean,
}

/// Macro means of the per-attempt decomposition
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DecompositionSummary {
    pub failed_build: MacroMean,
    pub built_failed_test: MacroMean,
    pub built_passed_test: MacroMean,
}

impl DecompositionSummary {
    /// Sum of the three means, `None` when there were no problems.
    pub fn sum(&self) -> Option<f64> {
        Some(
            self.failed_build.value?
                + self.built_failed_test.value?
                + self.built_passed_test.value?,
        )
    }
}

/// Unbiased pass@k means for one k
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UnbiasedSummary {
    pub stored: MacroMean,
    pub calculated: MacroMean,
}

/// Corpus-level summary of one input table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusSummary {
    /// Records folded
    pub problems: usize,
    pub generation: StageSummary,
    pub build: StageSummary,
    pub test: StageSummary,
    /// Pooled test successes / pooled build successes
    pub test_given_build: Option<f64>,
    pub first_attempt: FirstAttemptSummary,
    pub decomposition: DecompositionSummary,
    /// Macro mean of stored values; no micro form exists
    pub empirical_pass_at_k: BTreeMap<u32, MacroMean>,
    pub unbiased_pass_at_k: BTreeMap<u32, UnbiasedSummary>,
}

impl CorpusSummary {
    pub fn stage(&self, stage: Stage) -> &StageSummary {
        match stage {
            Stage::Generation => &self.generation,
            Stage::Build => &self.build,
            Stage::Test => &self.test,
        }
    }

    /// `first_test_success_rate - task_success_rate`, when both exist.
    pub fn task_success_discrepancy(&self) -> Option<f64> {
        Some(self.first_attempt.test.value? - self.first_attempt.task_success.value?)
    }

    /// One row of the corpus summary table, labelled with `label`.
    ///
    /// Columns follow the table read by the rounding step: rates as
    /// fractions, unbiased pass@k from calculated values. Absent values are
    /// empty cells.
    pub fn summary_row(&self, label: &str) -> Vec<(String, String)> {
        fn cell(value: Option<f64>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        let mut row = vec![
            ("model".to_string(), label.to_string()),
            ("problems".to_string(), self.problems.to_string()),
        ];
        for stage in Stage::ALL {
            row.push((
                format!("avg_{}_success_rate", stage.as_str()),
                cell(self.stage(stage).macro_rate.value),
            ));
        }
        for stage in Stage::ALL {
            row.push((
                format!("micro_{}_success_rate", stage.as_str()),
                cell(self.stage(stage).micro_rate),
            ));
        }
        row.push((
            "task_success_rate".to_string(),
            cell(self.first_attempt.task_success.value),
        ));
        row.push((
            "first_generation_success_rate".to_string(),
            cell(self.first_attempt.generation.value),
        ));
        row.push((
            "first_build_success_rate".to_string(),
            cell(self.first_attempt.build.value),
        ));
        row.push((
            "first_test_success_rate".to_string(),
            cell(self.first_attempt.test.value),
        ));
        row.push((
            "pass_given_build_rate".to_string(),
            cell(self.test_given_build),
        ));
        for (k, mean) in &self.empirical_pass_at_k {
            row.push((empirical_column(*k), cell(mean.value)));
        }
        for (k, summary) in &self.unbiased_pass_at_k {
            row.push((unbiased_column(*k), cell(summary.calculated.value)));
        }
        row
    }
}

// ============================================================================
// Aggregator
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
struct StageAccumulator {
    macro_rate: MeanAccumulator,
    pooled: PooledCounts,
}

impl StageAccumulator {
    fn merge(&mut self, other: &StageAccumulator) {
        self.macro_rate.merge(&other.macro_rate);
        self.pooled.merge(&other.pooled);
    }

    fn finish(&self) -> StageSummary {
        StageSummary {
            macro_rate: self.macro_rate.finish(),
            micro_rate: self.pooled.rate(),
            attempts: self.pooled.attempts,
            successes: self.pooled.successes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct UnbiasedAccumulator {
    stored: MeanAccumulator,
    calculated: MeanAccumulator,
}

/// Streaming accumulator for one input table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregator {
    problems: usize,
    generation: StageAccumulator,
    build: StageAccumulator,
    test: StageAccumulator,
    first_generation: MeanAccumulator,
    first_build: MeanAccumulator,
    first_test: MeanAccumulator,
    task_success: MeanAccumulator,
    failed_build: MeanAccumulator,
    built_failed_test: MeanAccumulator,
    built_passed_test: MeanAccumulator,
    empirical: BTreeMap<u32, MeanAccumulator>,
    unbiased: BTreeMap<u32, UnbiasedAccumulator>,
}

impl Aggregator {
    /// Aggregator reporting every k of the schema, even if no row carries it.
    pub fn new(schema: &ColumnSchema) -> Self {
        Self {
            empirical: schema
                .empirical_ks
                .iter()
                .map(|&k| (k, MeanAccumulator::default()))
                .collect(),
            unbiased: schema
                .unbiased_ks
                .iter()
                .map(|&k| (k, UnbiasedAccumulator::default()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn problems(&self) -> usize {
        self.problems
    }

    /// Number of problems contributing to a stage's macro rate
    pub fn macro_count(&self, stage: Stage) -> usize {
        self.stage_accumulator(stage).macro_rate.count()
    }

    fn stage_accumulator(&self, stage: Stage) -> &StageAccumulator {
        match stage {
            Stage::Generation => &self.generation,
            Stage::Build => &self.build,
            Stage::Test => &self.test,
        }
    }

    /// Fold one record into the running totals.
    pub fn fold(&mut self, record: &ProblemRecord) {
        self.problems += 1;

        for (acc, counts) in [
            (&mut self.generation, &record.generation),
            (&mut self.build, &record.build),
            (&mut self.test, &record.test),
        ] {
            acc.macro_rate.push(counts.calculated_rate());
            acc.pooled.add(counts.attempts, counts.successes);
        }

        let first = &record.first_success;
        self.first_generation.push(indicator(first.generation));
        self.first_build.push(indicator(first.build));
        self.first_test.push(indicator(first.test));
        self.task_success.push(indicator(record.task_success));

        let d = record.decomposition();
        self.failed_build.push(Some(d.failed_build));
        self.built_failed_test.push(Some(d.built_failed_test));
        self.built_passed_test.push(Some(d.built_passed_test));

        for (&k, value) in &record.empirical_pass_at_k {
            self.empirical.entry(k).or_default().push(*value);
        }
        for (&k, value) in &record.unbiased_pass_at_k_stored {
            self.unbiased.entry(k).or_default().stored.push(Some(*value));
        }
        for (&k, value) in &record.unbiased_pass_at_k_calculated {
            self.unbiased
                .entry(k)
                .or_default()
                .calculated
                .push(Some(*value));
        }
    }

    /// Combine with an aggregator folded over a disjoint set of records.
    pub fn merge(&mut self, other: Aggregator) {
        self.problems += other.problems;
        self.generation.merge(&other.generation);
        self.build.merge(&other.build);
        self.test.merge(&other.test);
        self.first_generation.merge(&other.first_generation);
        self.first_build.merge(&other.first_build);
        self.first_test.merge(&other.first_test);
        self.task_success.merge(&other.task_success);
        self.failed_build.merge(&other.failed_build);
        self.built_failed_test.merge(&other.built_failed_test);
        self.built_passed_test.merge(&other.built_passed_test);
        for (k, acc) in other.empirical {
            self.empirical.entry(k).or_default().merge(&acc);
        }
        for (k, acc) in other.unbiased {
            let entry = self.unbiased.entry(k).or_default();
            entry.stored.merge(&acc.stored);
            entry.calculated.merge(&acc.calculated);
        }
    }

    /// Compute means and ratios. Consumes the aggregator.
    pub fn finalize(self) -> CorpusSummary {
        CorpusSummary {
            problems: self.problems,
            generation: self.generation.finish(),
            build: self.build.finish(),
            test: self.test.finish(),
            test_given_build: self
                .test
                .pooled
                .exact_successes()
                .zip(self.build.pooled.exact_successes())
                .and_then(|(test, build)| ratio(test, build)),
            first_attempt: FirstAttemptSummary {
                generation: self.first_generation.finish(),
                build: self.first_build.finish(),
                test: self.first_test.finish(),
                task_success: self.task_success.finish(),
            },
            decomposition: DecompositionSummary {
                failed_build: self.failed_build.finish(),
                built_failed_test: self.built_failed_test.finish(),
                built_passed_test: self.built_passed_test.finish(),
            },
            empirical_pass_at_k: self
                .empirical
                .iter()
                .map(|(&k, acc)| (k, acc.finish()))
                .collect(),
            unbiased_pass_at_k: self
                .unbiased
                .iter()
                .map(|(&k, acc)| {
                    (
                        k,
                        UnbiasedSummary {
                            stored: acc.stored.finish(),
                            calculated: acc.calculated.finish(),
                        },
                    )
                })
                .collect(),
        }
    }
}

fn indicator(flag: Option<bool>) -> Option<f64> {
    flag.map(|b| if b { 1.0 } else { 0.0 })
}
