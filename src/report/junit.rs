//! JUnit XML report for CI systems.

use super::{ReportError, sorted_by_name};
use crate::runner::{Results, Summary, TestResult, TestStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

/// Format results as JUnit XML, stamped with the current time.
pub fn format_junit_xml(name: &str, results: &Results) -> String {
    format_junit_xml_at(name, results, Utc::now())
}

/// Format results as JUnit XML with a fixed timestamp.
pub fn format_junit_xml_at(name: &str, results: &Results, timestamp: DateTime<Utc>) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

    let summary = results.summary();
    let total_time: Duration = results.iter().map(|r| r.duration).sum();

    let _ = writeln!(
        xml,
        "<testsuites name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\" timestamp=\"{}\">",
        escape_xml(name),
        summary.total,
        summary.failed,
        summary.errored,
        summary.skipped,
        total_time.as_secs_f64(),
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    for (suite_name, suite) in results.suites() {
        let counts = Summary::from_results(suite);
        let suite_time: Duration = suite.iter().map(|r| r.duration).sum();

        let _ = writeln!(
            xml,
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\">",
            escape_xml(suite_name),
            counts.total,
            counts.failed,
            counts.errored,
            counts.skipped,
            suite_time.as_secs_f64()
        );

        for test in sorted_by_name(suite) {
            write_testcase(&mut xml, suite_name, test);
        }

        xml.push_str("  </testsuite>\n");
    }

    xml.push_str("</testsuites>\n");
    xml
}

fn write_testcase(xml: &mut String, suite_name: &str, test: &TestResult) {
    let _ = write!(
        xml,
        "    <testcase name=\"{}\" classname=\"{}\" time=\"{:.3}\"",
        escape_xml(&test.spec.name),
        escape_xml(suite_name),
        test.duration.as_secs_f64()
    );
    if let Some((file, line)) = test.spec.position() {
        let _ = write!(xml, " file=\"{}\"", escape_xml(file));
        if let Some(line) = line {
            let _ = write!(xml, " line=\"{}\"", escape_xml(line));
        }
    }

    match test.status {
        TestStatus::Success => {
            xml.push_str("/>\n");
            return;
        }
        TestStatus::Failure => {
            xml.push_str(">\n");
            let _ = writeln!(
                xml,
                "      <failure message=\"Test failed\">{}</failure>",
                escape_xml(&test.failure_detail())
            );
        }
        TestStatus::Error => {
            xml.push_str(">\n");
            let _ = writeln!(
                xml,
                "      <error message=\"Test errored\">{}</error>",
                escape_xml(&test.error_message)
            );
        }
        TestStatus::Skipped => {
            xml.push_str(">\n");
            xml.push_str("      <skipped message=\"Test skipped\"/>\n");
        }
    }
    xml.push_str("    </testcase>\n");
}

/// Write the JUnit report to `path`.
pub fn write_file(path: &Path, name: &str, results: &Results) -> Result<(), ReportError> {
    std::fs::write(path, format_junit_xml(name, results)).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
