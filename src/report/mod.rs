//! Reporters over a finished [`Results`](crate::runner::Results) set.
//!
//! Each reporter renders to a `String`; writing it anywhere is the caller's
//! business, except for [`junit::write_file`].

pub mod console;
pub mod json;
pub mod junit;

use crate::runner::TestResult;
use std::path::PathBuf;

/// Error type for writing reports.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write report to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Results of one suite ordered by test name.
pub(crate) fn sorted_by_name(results: &[TestResult]) -> Vec<&TestResult> {
    let mut sorted: Vec<&TestResult> = results.iter().collect();
    sorted.sort_by(|a, b| a.spec.name.cmp(&b.spec.name));
    sorted
}
