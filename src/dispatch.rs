//! Per-test dispatch.
//!
//! Each test goes through the same sequence: skip check, resolution of the
//! actual value, the type-specific step, and for `unit`/`snapshot` tests a
//! comparison. Every step either hands over to the next one or ends the test
//! with a terminal [`Outcome`]; an error ends it immediately, so nothing
//! later can overwrite it.

use crate::build::BuildService;
use crate::compare;
use crate::config::RunnerConfig;
use crate::filter::SkipFilter;
use crate::runner::{TestResult, TestStatus};
use crate::schema::{TestSpec, TestType};
use crate::snapshot::SnapshotStore;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Message for snapshot tests whose snapshot file doesn't exist.
pub const NO_SNAPSHOT_MESSAGE: &str = "No Snapshot exists yet";

/// Terminal state of one test.
#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Succeeded,
    /// Comparison mismatch, with both sides rendered.
    Mismatch { expected: String, actual: String },
    /// Script exited non-zero.
    ExitFailure(String),
    Errored(String),
    Skipped,
}

/// Runs single tests against the build service and snapshot store.
pub struct Dispatcher {
    snapshot_dir: PathBuf,
    update_snapshots: bool,
    impure_env: bool,
    build: Arc<dyn BuildService>,
    snapshots: Arc<dyn SnapshotStore>,
    skip: SkipFilter,
}

impl Dispatcher {
    pub fn new(
        config: &RunnerConfig,
        build: Arc<dyn BuildService>,
        snapshots: Arc<dyn SnapshotStore>,
        skip: SkipFilter,
    ) -> Self {
        Self {
            snapshot_dir: config.snapshot_dir.clone(),
            update_snapshots: config.update_snapshots,
            impure_env: config.impure_env,
            build,
            snapshots,
            skip,
        }
    }

    /// Run one test and produce its result.
    pub fn dispatch(&self, spec: &TestSpec) -> TestResult {
        let start = Instant::now();
        debug!(suite = %spec.suite, test = %spec.name, kind = %spec.test_type, "dispatching");

        let outcome = self.execute(spec);
        let duration = start.elapsed();

        let mut result = TestResult::new(spec.clone(), TestStatus::Success, duration);
        match outcome {
            Outcome::Succeeded => {}
            Outcome::Skipped => result.status = TestStatus::Skipped,
            Outcome::Mismatch { expected, actual } => {
                result.status = TestStatus::Failure;
                result.expected_rendered = expected;
                result.actual_rendered = actual;
            }
            Outcome::ExitFailure(message) => {
                result.status = TestStatus::Failure;
                result.error_message = message;
            }
            Outcome::Errored(message) => {
                result.status = TestStatus::Error;
                result.error_message = message;
            }
        }
        debug!(suite = %spec.suite, test = %spec.name, status = %result.status, ?duration, "finished");
        result
    }

    fn execute(&self, spec: &TestSpec) -> Outcome {
        if self.skip.matches(&spec.name) {
            return Outcome::Skipped;
        }

        let actual = match spec.actual_ref() {
            Some(reference) => match self.build.resolve_json(reference) {
                Ok(value) => value,
                Err(e) => {
                    return Outcome::Errored(format!(
                        "[system] failed to build/parse actualDrv {reference}: {e}"
                    ));
                }
            },
            None => spec.actual.clone().unwrap_or(Value::Null),
        };

        match &spec.test_type {
            TestType::Unit => {
                let expected = spec.expected.as_ref().unwrap_or(&Value::Null);
                compare_values(&actual, expected)
            }
            TestType::Snapshot => self.run_snapshot(spec, &actual),
            TestType::Script => self.run_script(spec),
            TestType::Unknown(kind) => Outcome::Errored(format!("Invalid test type: {kind}")),
        }
    }

    fn run_snapshot(&self, spec: &TestSpec, actual: &Value) -> Outcome {
        let path = self.snapshots.path_for(&self.snapshot_dir, &spec.name);

        if self.update_snapshots {
            if let Err(e) = self.snapshots.create(&path, actual) {
                return Outcome::Errored(format!("[system] failed to update snapshot: {e}"));
            }
            info!(test = %spec.name, path = %path.display(), "snapshot updated");
        }

        match self.snapshots.exists(&path) {
            Ok(true) => {}
            Ok(false) => return Outcome::Errored(NO_SNAPSHOT_MESSAGE.to_string()),
            Err(e) => return Outcome::Errored(format!("[system] {e}")),
        }

        match self.snapshots.load(&path) {
            Ok(expected) => compare_values(actual, &expected),
            Err(e) => Outcome::Errored(format!("[system] {e}")),
        }
    }

    fn run_script(&self, spec: &TestSpec) -> Outcome {
        let Some(reference) = spec.script_ref() else {
            return Outcome::Errored("[system] script test has no script derivation".to_string());
        };

        match self.build.run_script(reference, self.impure_env) {
            Err(e) => Outcome::Errored(format!(
                "[system] failed to run script derivation {reference}: {e}"
            )),
            Ok(output) if output.exit_code != 0 => Outcome::ExitFailure(format!(
                "[exit code {}]\n[stdout]\n{}\n[stderr]\n{}",
                output.exit_code, output.stdout, output.stderr
            )),
            Ok(_) => Outcome::Succeeded,
        }
    }
}

fn compare_values(actual: &Value, expected: &Value) -> Outcome {
    if compare::deep_equal(actual, expected) {
        return Outcome::Succeeded;
    }
    match compare::render(expected, actual) {
        Ok((expected, actual)) => Outcome::Mismatch { expected, actual },
        Err(e) => Outcome::Errored(format!("[system] failed to render values for diff: {e}")),
    }
}
