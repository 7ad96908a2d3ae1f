//! Machine-readable JSON report.

use super::{ReportError, sorted_by_name};
use crate::runner::{Results, TestResult, TestStatus};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct Report<'a> {
    passed: usize,
    failed: usize,
    errored: usize,
    skipped: usize,
    total: usize,
    results: BTreeMap<&'a str, Vec<Entry<'a>>>,
}

#[derive(Serialize)]
struct Entry<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(rename = "type")]
    test_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pos: Option<&'a str>,
    status: TestStatus,
    /// Seconds.
    duration: f64,
    #[serde(skip_serializing_if = "str::is_empty")]
    error_message: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    expected: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    actual: &'a str,
    #[serde(skip_serializing_if = "String::is_empty")]
    diff: String,
}

impl<'a> Entry<'a> {
    fn new(result: &'a TestResult) -> Self {
        let diff = if result.status == TestStatus::Failure && result.error_message.is_empty() {
            result.failure_detail()
        } else {
            String::new()
        };
        Self {
            name: &result.spec.name,
            description: &result.spec.description,
            test_type: result.spec.test_type.to_string(),
            pos: result.spec.pos.as_deref(),
            status: result.status,
            duration: result.duration.as_secs_f64(),
            error_message: &result.error_message,
            expected: &result.expected_rendered,
            actual: &result.actual_rendered,
            diff,
        }
    }
}

/// Pretty-printed report with suites in name order and tests sorted by name.
pub fn render(results: &Results) -> Result<String, ReportError> {
    let summary = results.summary();
    let report = Report {
        passed: summary.succeeded,
        failed: summary.failed,
        errored: summary.errored,
        skipped: summary.skipped,
        total: summary.total,
        results: results
            .suites()
            .map(|(name, suite)| {
                let entries = sorted_by_name(suite).into_iter().map(Entry::new).collect();
                (name, entries)
            })
            .collect(),
    };
    let mut out = serde_json::to_string_pretty(&report)?;
    out.push('\n');
    Ok(out)
}
