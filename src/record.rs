//! Per-problem records
//!
//! One input row becomes one [`ProblemRecord`]. Raw counts are kept as read,
//! rates and pass@k are recomputed from them, and every stored value is kept
//! alongside so the verifier can compare the two.

use crate::passk::unbiased_pass_at_k;
use crate::schema::{empirical_column, unbiased_column, ColumnSchema};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Sequential phase an attempt passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Generation,
    Build,
    Test,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Generation, Stage::Build, Stage::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Generation => "generation",
            Stage::Build => "build",
            Stage::Test => "test",
        }
    }

    pub fn attempts_column(&self) -> String {
        format!("{}_attempts", self.as_str())
    }

    pub fn successes_column(&self) -> String {
        format!("{}_successes", self.as_str())
    }

    pub fn rate_column(&self) -> String {
        format!("{}_success_rate", self.as_str())
    }

    pub fn first_success_column(&self) -> String {
        format!("first_{}_success", self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of named text cells for one row
pub trait FieldSource {
    /// Raw cell text; `None` when the column does not exist in this row.
    fn field(&self, name: &str) -> Option<&str>;
}

impl FieldSource for HashMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// A CSV record viewed through its header schema
pub struct Row<'a> {
    pub schema: &'a ColumnSchema,
    pub record: &'a csv::StringRecord,
}

impl FieldSource for Row<'_> {
    fn field(&self, name: &str) -> Option<&str> {
        self.schema
            .position(name)
            .and_then(|i| self.record.get(i))
    }
}

// ============================================================================
// Cell parsing
// ============================================================================

/// Counts: absent or unparseable cells are 0.
pub fn parse_count(raw: Option<&str>) -> u64 {
    read_count(raw).unwrap_or(0)
}

/// Count cell as written. Empty is `Ok(0)`; integral floats such as `4.0` are
/// accepted. Anything else, negatives included, is returned as `Err` with the
/// raw text.
pub fn read_count(raw: Option<&str>) -> std::result::Result<u64, String> {
    let s = match raw.map(str::trim) {
        None | Some("") => return Ok(0),
        Some(s) => s,
    };
    if let Ok(v) = s.parse::<u64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        // 2^64 is the first float past u64::MAX
        Ok(v) if v >= 0.0 && v.fract() == 0.0 && v < 18_446_744_073_709_551_616.0 => Ok(v as u64),
        _ => Err(s.to_string()),
    }
}

/// Rates and empirical pass@k: absent, unparseable or non-finite cells are `None`.
pub fn parse_optional_float(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Stored unbiased pass@k: absent or unparseable cells are 0.0.
///
/// This differs from [`parse_optional_float`] on purpose; the upstream
/// tables have always been read this way and the two conventions are kept
/// apart until the producer settles on one.
pub fn parse_float_or_zero(raw: Option<&str>) -> f64 {
    parse_optional_float(raw).unwrap_or(0.0)
}

/// 0/1 indicator cells. Empty text is absent, as is anything that is not 0 or 1.
pub fn parse_flag(raw: Option<&str>) -> Option<bool> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<i64>() {
        return match v {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        };
    }
    match s.parse::<f64>() {
        Ok(v) if v == 0.0 => Some(false),
        Ok(v) if v == 1.0 => Some(true),
        _ => None,
    }
}

// ============================================================================
// Record types
// ============================================================================

/// Attempt counts and stored rate for one stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageCounts {
    pub attempts: u64,
    pub successes: u64,
    /// Rate as written in the input
    pub stored_rate: Option<f64>,
}

impl StageCounts {
    /// successes / attempts; absent for a stage with no attempts.
    pub fn calculated_rate(&self) -> Option<f64> {
        if self.attempts > 0 {
            Some(self.successes as f64 / self.attempts as f64)
        } else {
            None
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.successes <= self.attempts
    }
}

/// Whether attempt 0 succeeded, per stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstAttempt {
    pub generation: Option<bool>,
    pub build: Option<bool>,
    pub test: Option<bool>,
}

impl FirstAttempt {
    pub fn get(&self, stage: Stage) -> Option<bool> {
        match stage {
            Stage::Generation => self.generation,
            Stage::Build => self.build,
            Stage::Test => self.test,
        }
    }
}

/// Per-attempt split of outcomes, from calculated rates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub failed_build: f64,
    pub built_failed_test: f64,
    pub built_passed_test: f64,
}

impl Decomposition {
    pub fn sum(&self) -> f64 {
        self.failed_build + self.built_failed_test + self.built_passed_test
    }
}

/// Count cell that could not be read and was taken as 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedCount {
    pub column: String,
    pub value: String,
}

/// One benchmark problem, parsed from a single row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub id: String,
    pub total_attempts: u64,
    pub generation: StageCounts,
    pub build: StageCounts,
    pub test: StageCounts,
    pub first_success: FirstAttempt,
    /// Independent column expected to equal `first_success.test`
    pub task_success: Option<bool>,
    /// Read verbatim; there are no per-attempt samples to recompute them from
    pub empirical_pass_at_k: BTreeMap<u32, Option<f64>>,
    /// Read from input, 0.0 when missing
    pub unbiased_pass_at_k_stored: BTreeMap<u32, f64>,
    /// Recomputed from test attempts and successes
    pub unbiased_pass_at_k_calculated: BTreeMap<u32, f64>,
    /// Count cells read as 0 because they were not whole non-negative numbers
    #[serde(default)]
    pub malformed_counts: Vec<MalformedCount>,
}

impl ProblemRecord {
    /// Parse one row. Never fails: bad cells become 0 or absent.
    pub fn parse(row: &impl FieldSource, schema: &ColumnSchema) -> Self {
        let mut malformed_counts = Vec::new();
        let mut count = |column: &str| {
            read_count(row.field(column)).unwrap_or_else(|value| {
                malformed_counts.push(MalformedCount {
                    column: column.to_string(),
                    value,
                });
                0
            })
        };

        let total_attempts = count("total_attempts");
        let mut stage = |stage: Stage| StageCounts {
            attempts: count(stage.attempts_column().as_str()),
            successes: count(stage.successes_column().as_str()),
            stored_rate: parse_optional_float(row.field(&stage.rate_column())),
        };
        let generation = stage(Stage::Generation);
        let build = stage(Stage::Build);
        let test = stage(Stage::Test);

        let first_success = FirstAttempt {
            generation: parse_flag(row.field(&Stage::Generation.first_success_column())),
            build: parse_flag(row.field(&Stage::Build.first_success_column())),
            test: parse_flag(row.field(&Stage::Test.first_success_column())),
        };

        let empirical_pass_at_k = schema
            .empirical_ks
            .iter()
            .map(|&k| (k, parse_optional_float(row.field(&empirical_column(k)))))
            .collect();

        let unbiased_pass_at_k_stored = schema
            .unbiased_ks
            .iter()
            .map(|&k| (k, parse_float_or_zero(row.field(&unbiased_column(k)))))
            .collect();

        let unbiased_pass_at_k_calculated = schema
            .unbiased_ks
            .iter()
            .map(|&k| (k, unbiased_pass_at_k(test.attempts, test.successes, k)))
            .collect();

        Self {
            id: row
                .field("problem_id")
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            total_attempts,
            generation,
            build,
            test,
            first_success,
            task_success: parse_flag(row.field("task_success")),
            empirical_pass_at_k,
            unbiased_pass_at_k_stored,
            unbiased_pass_at_k_calculated,
            malformed_counts,
        }
    }

    /// Whether either count of `stage` was malformed in the input
    pub fn has_malformed_counts(&self, stage: Stage) -> bool {
        let attempts = stage.attempts_column();
        let successes = stage.successes_column();
        self.malformed_counts
            .iter()
            .any(|m| m.column == attempts || m.column == successes)
    }

    pub fn stage(&self, stage: Stage) -> &StageCounts {
        match stage {
            Stage::Generation => &self.generation,
            Stage::Build => &self.build,
            Stage::Test => &self.test,
        }
    }

    /// Split of the unit attempt population; absent rates count as 0.
    ///
    /// Components are not clamped, so a test rate above the build rate shows
    /// up as a negative `built_failed_test`.
    pub fn decomposition(&self) -> Decomposition {
        let build = self.build.calculated_rate().unwrap_or(0.0);
        let test = self.test.calculated_rate().unwrap_or(0.0);
        Decomposition {
            failed_build: 1.0 - build,
            built_failed_test: build - test,
            built_passed_test: test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> HashMap<String, String> {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn schema_for(cells: &[(&str, &str)]) -> ColumnSchema {
        ColumnSchema::from_headers(cells.iter().map(|(k, _)| *k))
    }

    #[test]
    fn test_parse_counts_and_rates() {
        let cells = [
            ("problem_id", "p1"),
            ("total_attempts", "4"),
            ("build_attempts", "4"),
            ("build_successes", "3"),
            ("build_success_rate", "0.80"),
            ("test_attempts", "3"),
            ("test_successes", "abc"),
        ];
        let record = ProblemRecord::parse(&row(&cells), &schema_for(&cells));

        assert_eq!(record.id, "p1");
        assert_eq!(record.total_attempts, 4);
        assert_eq!(record.build.calculated_rate(), Some(0.75));
        assert_eq!(record.build.stored_rate, Some(0.80));
        assert_eq!(record.test.successes, 0);
        assert_eq!(record.test.calculated_rate(), Some(0.0));
        assert_eq!(record.generation, StageCounts::default());
    }

    #[test]
    fn test_zero_attempts_leaves_rate_absent() {
        let counts = StageCounts {
            attempts: 0,
            successes: 0,
            stored_rate: Some(0.0),
        };
        assert_eq!(counts.calculated_rate(), None);
        assert_ne!(counts.calculated_rate(), Some(0.0));
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!(parse_flag(Some("1")), Some(true));
        assert_eq!(parse_flag(Some("0")), Some(false));
        assert_eq!(parse_flag(Some(" 1.0 ")), Some(true));
        assert_eq!(parse_flag(Some("")), None);
        assert_eq!(parse_flag(Some("yes")), None);
        assert_eq!(parse_flag(Some("2")), None);
        assert_eq!(parse_flag(None), None);
    }

    #[test]
    fn test_float_conventions_differ() {
        assert_eq!(parse_optional_float(Some("")), None);
        assert_eq!(parse_optional_float(Some("nan")), None);
        assert_eq!(parse_optional_float(Some("0.25")), Some(0.25));
        assert_eq!(parse_float_or_zero(Some("")), 0.0);
        assert_eq!(parse_float_or_zero(None), 0.0);
        assert_eq!(parse_float_or_zero(Some("0.5")), 0.5);
        assert_eq!(parse_count(Some("-3")), 0);
        assert_eq!(parse_count(Some(" 7 ")), 7);
    }

    #[test]
    fn test_count_cells() {
        assert_eq!(read_count(None), Ok(0));
        assert_eq!(read_count(Some(" ")), Ok(0));
        assert_eq!(read_count(Some("12")), Ok(12));
        assert_eq!(read_count(Some("4.0")), Ok(4));
        assert_eq!(read_count(Some("-4")), Err("-4".to_string()));
        assert_eq!(read_count(Some("2.5")), Err("2.5".to_string()));
        assert_eq!(read_count(Some("nan")), Err("nan".to_string()));
        assert_eq!(read_count(Some("lots")), Err("lots".to_string()));
    }

    #[test]
    fn test_malformed_counts_recorded() {
        let cells = [
            ("problem_id", "neg"),
            ("build_attempts", "-4"),
            ("build_successes", "2"),
            ("test_attempts", "4.0"),
            ("test_successes", "1"),
        ];
        let record = ProblemRecord::parse(&row(&cells), &schema_for(&cells));

        assert_eq!(record.build.attempts, 0);
        assert_eq!(record.test.attempts, 4);
        assert_eq!(
            record.malformed_counts,
            vec![MalformedCount {
                column: "build_attempts".to_string(),
                value: "-4".to_string(),
            }]
        );
        assert!(record.has_malformed_counts(Stage::Build));
        assert!(!record.has_malformed_counts(Stage::Test));
    }

    #[test]
    fn test_pass_at_k_families() {
        let cells = [
            ("test_attempts", "4"),
            ("test_successes", "2"),
            ("empirical_pass_at_1", "0.5"),
            ("empirical_pass_at_2", ""),
            ("unbiased_pass_at_1", "0.5"),
            ("unbiased_pass_at_2", ""),
        ];
        let record = ProblemRecord::parse(&row(&cells), &schema_for(&cells));

        assert_eq!(record.empirical_pass_at_k[&1], Some(0.5));
        assert_eq!(record.empirical_pass_at_k[&2], None);
        assert_eq!(record.unbiased_pass_at_k_stored[&2], 0.0);
        assert!((record.unbiased_pass_at_k_calculated[&1] - 0.5).abs() < 1e-12);
        assert!((record.unbiased_pass_at_k_calculated[&2] - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_flags_and_task_success() {
        let cells = [
            ("first_generation_success", "1"),
            ("first_build_success", ""),
            ("first_test_success", "0"),
            ("task_success", "1"),
        ];
        let record = ProblemRecord::parse(&row(&cells), &schema_for(&cells));

        assert_eq!(record.first_success.generation, Some(true));
        assert_eq!(record.first_success.build, None);
        assert_eq!(record.first_success.get(Stage::Test), Some(false));
        assert_eq!(record.task_success, Some(true));
    }

    #[test]
    fn test_decomposition_sums_to_one_when_ordered() {
        for build_successes in 0..=8u64 {
            for test_successes in 0..=build_successes {
                let record = ProblemRecord {
                    build: StageCounts {
                        attempts: 8,
                        successes: build_successes,
                        stored_rate: None,
                    },
                    test: StageCounts {
                        attempts: 8,
                        successes: test_successes,
                        stored_rate: None,
                    },
                    ..ProblemRecord::parse(&HashMap::<String, String>::new(), &ColumnSchema::default())
                };
                let d = record.decomposition();
                assert!((d.sum() - 1.0).abs() < 1e-9);
                assert!(d.built_failed_test >= 0.0);
            }
        }
    }

    #[test]
    fn test_decomposition_goes_negative_when_test_exceeds_build() {
        let record = ProblemRecord {
            build: StageCounts {
                attempts: 4,
                successes: 1,
                stored_rate: None,
            },
            test: StageCounts {
                attempts: 4,
                successes: 3,
                stored_rate: None,
            },
            ..ProblemRecord::parse(&HashMap::<String, String>::new(), &ColumnSchema::default())
        };
        let d = record.decomposition();
        assert!((d.built_failed_test + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_csv_row_view() {
        let schema = ColumnSchema::from_headers(["problem_id", "test_attempts"]);
        let record = csv::StringRecord::from(vec!["p9"]);
        let view = Row {
            schema: &schema,
            record: &record,
        };
        assert_eq!(view.field("problem_id"), Some("p9"));
        assert_eq!(view.field("test_attempts"), None);
        assert_eq!(view.field("missing"), None);
    }
}
