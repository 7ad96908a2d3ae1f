//! Human-readable console report.
//!
//! With `use_color` set, failure headers, `|` prefixes, diff lines, status
//! labels and suite names are styled with ANSI colors.

use super::sorted_by_name;
use crate::runner::{Results, TestResult, TestStatus};
use colored::Colorize;
use std::fmt::Write as _;

/// Failure details followed by the summary.
pub fn render(results: &Results, use_color: bool) -> String {
    let mut out = render_failures(results, use_color);
    out.push_str(&render_summary(results, use_color));
    out
}

/// One block per failed or errored test, each detail line prefixed by `| `.
pub fn render_failures(results: &Results, use_color: bool) -> String {
    let mut out = String::new();
    let prefix = if use_color {
        "|".red().to_string()
    } else {
        "|".to_string()
    };

    for (_, suite) in results.suites() {
        for result in sorted_by_name(suite) {
            if result.status.is_ok() {
                continue;
            }
            let header = format!(
                "⚠ Test \"{}/{}\" failed:",
                result.spec.suite, result.spec.name
            );
            if use_color {
                let _ = writeln!(out, "{}", header.red());
            } else {
                let _ = writeln!(out, "{header}");
            }

            let mut message = result.failure_detail();
            if message.is_empty() {
                message = "- no output -".to_string();
            }
            // Only comparison diffs get per-line coloring.
            let is_diff = result.status == TestStatus::Failure && result.error_message.is_empty();
            for line in message.trim_end_matches('\n').split('\n') {
                if use_color && is_diff {
                    let _ = writeln!(out, "{prefix} {}", diff_line(line));
                } else {
                    let _ = writeln!(out, "{prefix} {line}");
                }
            }
            out.push('\n');
        }
    }
    out
}

/// Per-suite and overall counts with one line per test.
pub fn render_summary(results: &Results, use_color: bool) -> String {
    let mut out = String::from("Summary:\n");

    for (name, suite) in results.suites() {
        if use_color {
            let _ = writeln!(out, "{}  {}", name.bold(), ratio(suite));
        } else {
            let _ = writeln!(out, "{name}  {}", ratio(suite));
        }
        for result in sorted_by_name(suite) {
            let _ = writeln!(out, "  {}", test_line(result, use_color));
        }
    }

    let summary = results.summary();
    let total = ratio_of(summary.succeeded, summary.total, summary.skipped);
    if use_color {
        let _ = writeln!(out, "{}  {}", "TOTAL".bold(), total.bold());
    } else {
        let _ = writeln!(out, "TOTAL  {total}");
    }
    out
}

fn label(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Success => "PASS",
        TestStatus::Failure => "FAIL",
        TestStatus::Error => "ERROR",
        TestStatus::Skipped => "SKIP",
    }
}

/// Status label padded to a fixed width, then colored.
fn styled_label(status: TestStatus, use_color: bool) -> String {
    let padded = format!("{:<5}", label(status));
    if !use_color {
        return padded;
    }
    match status {
        TestStatus::Success => padded.green().to_string(),
        TestStatus::Failure => padded.red().to_string(),
        TestStatus::Error => padded.yellow().to_string(),
        TestStatus::Skipped => padded.blue().to_string(),
    }
}

fn diff_line(line: &str) -> String {
    if line.starts_with("+++") || line.starts_with("---") {
        line.bold().to_string()
    } else if line.starts_with('+') {
        line.green().to_string()
    } else if line.starts_with('-') {
        line.red().to_string()
    } else if line.starts_with("@@") {
        line.cyan().to_string()
    } else {
        line.to_string()
    }
}

fn test_line(result: &TestResult, use_color: bool) -> String {
    let mut line = format!(
        "{}  {} ({}ms)",
        styled_label(result.status, use_color),
        result.spec.name,
        result.duration.as_millis()
    );
    if let Some(pos) = result.spec.pos.as_deref().filter(|p| !p.is_empty()) {
        let _ = write!(line, "  {pos}");
    }
    line
}

fn ratio(results: &[TestResult]) -> String {
    let succeeded = results
        .iter()
        .filter(|r| r.status == TestStatus::Success)
        .count();
    let skipped = results
        .iter()
        .filter(|r| r.status == TestStatus::Skipped)
        .count();
    ratio_of(succeeded, results.len(), skipped)
}

fn ratio_of(succeeded: usize, total: usize, skipped: usize) -> String {
    if skipped > 0 {
        format!("{succeeded}/{total} ({skipped} skipped)")
    } else {
        format!("{succeeded}/{total}")
    }
}
