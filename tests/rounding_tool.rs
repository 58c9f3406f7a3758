//! Rounding of corpus summary tables written by the verifier

use bench_verify::rounding::round_summary_file;
use bench_verify::style::Style;
use bench_verify::{write_summary_csv, TextReport, Verifier};
use tempfile::TempDir;

#[test]
fn test_rounds_recognized_columns_only() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("all_models_summary.csv");
    std::fs::write(
        &input,
        "model,avg_build_success_rate,task_success_rate,unbiased_pass_at_1,empirical_pass_at_5,notes\n\
         m1,0.87654,0.5,0.83333,0.126,0.33333\n\
         m2,,NA,1,0,keep\n",
    )
    .unwrap();
    let output = dir.path().join("rounded.csv");

    let rows = round_summary_file(&input, &output).unwrap();
    assert_eq!(rows, 2);

    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "model,avg_build_success_rate,task_success_rate,unbiased_pass_at_1,empirical_pass_at_5,notes"
    );
    assert_eq!(lines[1], "m1,87.7,50.0,0.83,0.13,0.33333");
    assert_eq!(lines[2], "m2,,NA,1.0,0.0,keep");
}

#[test]
fn test_verifier_summary_feeds_rounding() {
    let dir = TempDir::new().unwrap();
    let problems = dir.path().join("model_problems.csv");
    std::fs::write(
        &problems,
        "problem_id,build_attempts,build_successes,test_attempts,test_successes,unbiased_pass_at_1\n\
         a,3,2,3,1,0.3333\n\
         b,3,3,3,3,1.0\n",
    )
    .unwrap();

    let mut report = TextReport::new(Vec::new(), Style::PLAIN);
    let outcome = Verifier::default().verify_path(&problems, &mut report).unwrap();

    let summary = dir.path().join("summary.csv");
    write_summary_csv(&summary, "model", &outcome.summary).unwrap();
    let rounded = dir.path().join("summary_rounded.csv");
    round_summary_file(&summary, &rounded).unwrap();

    let mut reader = csv::Reader::from_path(&rounded).unwrap();
    let headers = reader.headers().unwrap().clone();
    let row = reader.records().next().unwrap().unwrap();
    let cell = |name: &str| {
        let i = headers.iter().position(|h| h == name).unwrap();
        row.get(i).unwrap().to_string()
    };

    // (2/3 + 1) / 2
    assert_eq!(cell("avg_build_success_rate"), "83.3");
    // (1/3 + 1) / 2
    assert_eq!(cell("unbiased_pass_at_1"), "0.67");
    assert_eq!(cell("problems"), "2");
    assert_eq!(cell("task_success_rate"), "");
}

#[test]
fn test_missing_summary_file() {
    let dir = TempDir::new().unwrap();
    let err = round_summary_file(
        &dir.path().join("absent.csv"),
        &dir.path().join("out.csv"),
    )
    .unwrap_err();
    assert!(err.to_string().contains("absent.csv"));
}
