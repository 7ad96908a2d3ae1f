//! Test execution engine.
//!
//! [`Runner`] flattens the suite list, hands every test to the worker pool
//! and groups the results by suite.

use crate::build::BuildService;
use crate::compare;
use crate::config::{ConfigError, RunnerConfig};
use crate::dispatch::Dispatcher;
use crate::filter::SkipFilter;
use crate::scheduler::Scheduler;
use crate::schema::{SuiteSpec, TestSpec};
use crate::snapshot::SnapshotStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Terminal status of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Success,
    Failure,
    Error,
    Skipped,
}

impl TestStatus {
    /// Whether this status counts towards a passing run.
    pub fn is_ok(self) -> bool {
        matches!(self, TestStatus::Success | TestStatus::Skipped)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TestStatus::Success => "SUCCESS",
            TestStatus::Failure => "FAILURE",
            TestStatus::Error => "ERROR",
            TestStatus::Skipped => "SKIPPED",
        })
    }
}

/// Result of running a single test.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub spec: TestSpec,
    pub status: TestStatus,
    pub duration: Duration,
    /// Error or exit diagnostics. Empty for comparison failures.
    pub error_message: String,
    /// Rendered expected value, set for comparison failures.
    pub expected_rendered: String,
    /// Rendered actual value, set for comparison failures.
    pub actual_rendered: String,
}

impl TestResult {
    /// A result with no message or rendered values.
    pub fn new(spec: TestSpec, status: TestStatus, duration: Duration) -> Self {
        Self {
            spec,
            status,
            duration,
            error_message: String::new(),
            expected_rendered: String::new(),
            actual_rendered: String::new(),
        }
    }

    pub fn errored(spec: TestSpec, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            error_message: message.into(),
            ..Self::new(spec, TestStatus::Error, duration)
        }
    }

    /// Text explaining a failed or errored result.
    ///
    /// The explicit message wins; comparison failures fall back to a diff
    /// of the rendered values, computed here rather than at run time.
    pub fn failure_detail(&self) -> String {
        if !self.error_message.is_empty() {
            return self.error_message.clone();
        }
        if self.status == TestStatus::Failure {
            return compare::diff(&self.expected_rendered, &self.actual_rendered);
        }
        String::new()
    }
}

/// Aggregate counts over a set of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a TestResult>) -> Self {
        let mut summary = Summary::default();
        for result in results {
            summary.total += 1;
            match result.status {
                TestStatus::Success => summary.succeeded += 1,
                TestStatus::Failure => summary.failed += 1,
                TestStatus::Error => summary.errored += 1,
                TestStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    /// True when no test failed or errored.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }
}

/// Results grouped by suite name.
///
/// Order within a suite is completion order; reporters sort as needed.
#[derive(Debug, Clone, Default)]
pub struct Results {
    suites: BTreeMap<String, Vec<TestResult>>,
}

impl Results {
    /// Group results by their suite back-reference.
    ///
    /// Every suite in `suites` gets an entry, even one without tests.
    pub fn collect(suites: &[SuiteSpec], results: impl IntoIterator<Item = TestResult>) -> Self {
        let mut grouped: BTreeMap<String, Vec<TestResult>> = suites
            .iter()
            .map(|suite| (suite.name.clone(), Vec::with_capacity(suite.tests.len())))
            .collect();
        for result in results {
            grouped
                .entry(result.spec.suite.clone())
                .or_default()
                .push(result);
        }
        Self { suites: grouped }
    }

    /// Suites in name order.
    pub fn suites(&self) -> impl Iterator<Item = (&str, &[TestResult])> {
        self.suites
            .iter()
            .map(|(name, results)| (name.as_str(), results.as_slice()))
    }

    pub fn get(&self, suite: &str) -> Option<&[TestResult]> {
        self.suites.get(suite).map(Vec::as_slice)
    }

    /// All results across suites.
    pub fn iter(&self) -> impl Iterator<Item = &TestResult> {
        self.suites.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.suites.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> Summary {
        Summary::from_results(self.iter())
    }
}

/// Runs suite lists against a configuration and its collaborators.
pub struct Runner {
    config: RunnerConfig,
    dispatcher: Dispatcher,
}

impl Runner {
    /// Validate the configuration and compile the skip pattern.
    pub fn new(
        config: RunnerConfig,
        build: Arc<dyn BuildService>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let skip = SkipFilter::new(config.skip_pattern.as_deref())?;
        if let Some(pattern) = skip.pattern() {
            debug!(pattern, "skipping tests matching pattern");
        }
        let dispatcher = Dispatcher::new(&config, build, snapshots, skip);
        Ok(Self { config, dispatcher })
    }

    /// Run every test of every suite to completion.
    pub fn run(&self, suites: &[SuiteSpec]) -> Results {
        let total: usize = suites.iter().map(|s| s.tests.len()).sum();
        info!(
            suites = suites.len(),
            tests = total,
            workers = self.config.workers,
            "running tests"
        );

        let start = Instant::now();
        let scheduler = Scheduler::new(&self.dispatcher, self.config.workers);
        let results = Results::collect(suites, scheduler.run(suites));

        let summary = results.summary();
        for result in results.iter().filter(|r| r.status == TestStatus::Error) {
            warn!(
                suite = %result.spec.suite,
                test = %result.spec.name,
                "test errored: {}",
                result.error_message
            );
        }
        info!(
            passed = summary.succeeded,
            failed = summary.failed,
            errored = summary.errored,
            skipped = summary.skipped,
            elapsed = ?start.elapsed(),
            "run finished"
        );
        results
    }
}
