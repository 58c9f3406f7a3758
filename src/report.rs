//! Human-readable verification report
//!
//! Rendering only: records and the summary arrive fully computed and are
//! written to any [`std::io::Write`].

use crate::aggregate::{CorpusSummary, MacroMean};
use crate::record::Stage;
use crate::style::{flag, pct, prob, Style};
use crate::verify::{Agreement, Comparison, RecordReport, SummaryFinding};
use comfy_table::{presets::UTF8_FULL, Table};
use std::io::{self, Write};

/// Destination for per-record comparisons and the final summary
pub trait ReportSink {
    fn record(&mut self, report: &RecordReport) -> io::Result<()>;

    fn summary(&mut self, summary: &CorpusSummary, findings: &[SummaryFinding])
        -> io::Result<()>;
}

/// Plain-text report, optionally colored
pub struct TextReport<W: Write> {
    out: W,
    style: Style,
    show_matching: bool,
    records_written: usize,
}

impl<W: Write> TextReport<W> {
    pub fn new(out: W, style: Style) -> Self {
        Self {
            out,
            style,
            show_matching: true,
            records_written: 0,
        }
    }

    /// Skip comparison blocks of records without findings.
    pub fn show_matching(mut self, show: bool) -> Self {
        self.show_matching = show;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn rate_line(&mut self, stage: Stage, comparison: &Comparison) -> io::Result<()> {
        writeln!(
            self.out,
            "  {:<24}: {:>8}  | calc {:>8}  {}",
            format!("{}_success_rate", stage),
            pct(comparison.stored),
            pct(comparison.calculated),
            agreement_marker(self.style, comparison.agreement)
        )
    }

    fn mean_line(&mut self, label: &str, mean: &MacroMean) -> io::Result<()> {
        writeln!(
            self.out,
            "  {:<30}: {:>8}  {}",
            label,
            pct(mean.value),
            self.style.dim(&format!("(n={})", mean.count))
        )
    }
}

impl<W: Write> ReportSink for TextReport<W> {
    fn record(&mut self, report: &RecordReport) -> io::Result<()> {
        if !self.show_matching && !report.has_findings() {
            return Ok(());
        }
        if self.records_written == 0 {
            writeln!(self.out)?;
            writeln!(self.out, "{}", self.style.header("Per-Problem Checks"))?;
        }
        self.records_written += 1;
        let style = self.style;

        writeln!(self.out, "{}", "=".repeat(72))?;
        let status = if report.has_findings() {
            format!(
                "{} {} finding(s)",
                style.icon_error(),
                report.findings.len()
            )
        } else {
            style.icon_success()
        };
        writeln!(
            self.out,
            "Problem {}  {}  {}",
            style.bold(&report.id),
            style.dim(&format!("(total attempts {})", report.total_attempts)),
            status
        )?;

        writeln!(self.out, "{}", style.section("Rates (stored vs calc)"))?;
        for (stage, comparison) in &report.rates {
            self.rate_line(*stage, comparison)?;
        }

        writeln!(self.out, "{}", style.section("First attempt"))?;
        for (stage, value) in &report.first_success {
            writeln!(
                self.out,
                "  {:<24}: {}",
                stage.first_success_column(),
                flag(*value)
            )?;
        }
        writeln!(
            self.out,
            "  {:<24}: {}  {}",
            "task_success",
            flag(report.task_success),
            style.dim("(should equal first_test_success)")
        )?;

        if !report.empirical_pass_at_k.is_empty() {
            writeln!(self.out, "{}", style.section("Empirical pass@k (stored only)"))?;
            for (k, value) in &report.empirical_pass_at_k {
                writeln!(
                    self.out,
                    "  {:<24}: {:>7}",
                    format!("empirical_pass_at_{}", k),
                    prob(*value)
                )?;
            }
        }

        if !report.unbiased_pass_at_k.is_empty() {
            writeln!(self.out, "{}", style.section("Unbiased pass@k (stored vs calc)"))?;
            for (k, comparison) in &report.unbiased_pass_at_k {
                writeln!(
                    self.out,
                    "  {:<24}: {:>7}  | calc {:>7}  {}",
                    format!("unbiased_pass_at_{}", k),
                    prob(comparison.stored),
                    prob(comparison.calculated),
                    agreement_marker(style, comparison.agreement)
                )?;
            }
        }

        let d = report.decomposition;
        writeln!(
            self.out,
            "{}",
            style.section("Decomposition (per-attempt, from calc rates)")
        )?;
        writeln!(self.out, "  {:<24}: {:>8}", "failed_build", pct(Some(d.failed_build)))?;
        writeln!(
            self.out,
            "  {:<24}: {:>8}",
            "built_failed_test",
            pct(Some(d.built_failed_test))
        )?;
        writeln!(
            self.out,
            "  {:<24}: {:>8}",
            "built_passed_test",
            pct(Some(d.built_passed_test))
        )?;

        if report.has_findings() {
            writeln!(self.out, "{}", style.section("Findings"))?;
            for finding in &report.findings {
                writeln!(
                    self.out,
                    "  {} {}",
                    style.icon_error(),
                    style.red(&finding.to_string())
                )?;
            }
        }
        Ok(())
    }

    fn summary(
        &mut self,
        summary: &CorpusSummary,
        findings: &[SummaryFinding],
    ) -> io::Result<()> {
        let style = self.style;
        writeln!(self.out)?;
        writeln!(self.out, "{}", style.header("Final Summary"))?;
        writeln!(
            self.out,
            "Problems: {} {}",
            summary.problems,
            style.dim(&format!(
                "({} with build attempts)",
                summary.build.macro_rate.count
            ))
        )?;

        writeln!(self.out)?;
        writeln!(self.out, "{}", style.section("Macro averages (per-problem means)"))?;
        for stage in Stage::ALL {
            let mean = summary.stage(stage).macro_rate;
            self.mean_line(&format!("avg_{}_success_rate", stage), &mean)?;
        }

        writeln!(self.out)?;
        writeln!(self.out, "{}", style.section("First attempt (rates across problems)"))?;
        let first = summary.first_attempt;
        self.mean_line("first_generation_success_rate", &first.generation)?;
        self.mean_line("first_build_success_rate", &first.build)?;
        self.mean_line("first_test_success_rate", &first.test)?;
        self.mean_line("task_success_rate", &first.task_success)?;

        writeln!(self.out)?;
        writeln!(self.out, "{}", style.section("Stage decomposition (macro per-attempt)"))?;
        let d = summary.decomposition;
        self.mean_line("failed_build", &d.failed_build)?;
        self.mean_line("compiled; tests failed", &d.built_failed_test)?;
        self.mean_line("compiled; tests passed", &d.built_passed_test)?;

        writeln!(self.out)?;
        writeln!(self.out, "{}", style.section("Micro averages (pooled attempts)"))?;
        for stage in Stage::ALL {
            let s = summary.stage(stage);
            writeln!(
                self.out,
                "  {:<30}: {:>8}  {}",
                format!("{}_success_rate", stage),
                pct(s.micro_rate),
                style.dim(&format!("({}/{})", s.successes, s.attempts))
            )?;
        }

        writeln!(self.out)?;
        writeln!(self.out, "{}", style.section("Conditional success (micro)"))?;
        writeln!(
            self.out,
            "  {:<30}: {:>8}",
            "P(pass | compiled)",
            pct(summary.test_given_build)
        )?;

        if !summary.empirical_pass_at_k.is_empty() || !summary.unbiased_pass_at_k.is_empty() {
            writeln!(self.out)?;
            writeln!(self.out, "{}", style.section("pass@k (macro means)"))?;
            writeln!(self.out, "{}", pass_at_k_table(summary))?;
        }

        writeln!(self.out)?;
        if findings.is_empty() {
            writeln!(
                self.out,
                "{} {}",
                style.icon_success(),
                style.green("Corpus-level checks passed")
            )?;
        } else {
            writeln!(self.out, "{}", style.section("Corpus findings"))?;
            for finding in findings {
                writeln!(
                    self.out,
                    "  {} {}",
                    style.icon_warning(),
                    style.yellow(&finding.to_string())
                )?;
            }
        }
        self.out.flush()
    }
}

fn agreement_marker(style: Style, agreement: Agreement) -> String {
    match agreement {
        Agreement::Match => style.icon_success(),
        Agreement::Mismatch => format!("{} {}", style.icon_error(), style.red("MISMATCH")),
        Agreement::StoredOnly => style.gray("(no attempts)"),
        Agreement::CalculatedOnly => style.gray("(not stored)"),
        Agreement::BothAbsent => String::new(),
    }
}

/// One row per k across both pass@k families.
fn pass_at_k_table(summary: &CorpusSummary) -> Table {
    let mut ks: Vec<u32> = summary
        .empirical_pass_at_k
        .keys()
        .chain(summary.unbiased_pass_at_k.keys())
        .copied()
        .collect();
    ks.sort_unstable();
    ks.dedup();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "k",
        "empirical",
        "unbiased (stored)",
        "unbiased (calc)",
    ]);

    for k in ks {
        let empirical = summary
            .empirical_pass_at_k
            .get(&k)
            .map(|m| prob(m.value))
            .unwrap_or_else(|| "-".to_string());
        let (stored, calculated) = summary
            .unbiased_pass_at_k
            .get(&k)
            .map(|u| (prob(u.stored.value), prob(u.calculated.value)))
            .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
        table.add_row(vec![k.to_string(), empirical, stored, calculated]);
    }
    table
}
