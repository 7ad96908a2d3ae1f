//! Parallel test runner for declarative suites of unit, snapshot and
//! script tests whose values are produced by Nix builds.

pub mod build;
pub mod compare;
pub mod config;
pub mod dispatch;
pub mod filter;
pub mod loader;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod schema;
pub mod snapshot;

pub use build::{BuildError, BuildService, NixBuildService, ScriptOutput};
pub use config::{ConfigError, FileConfig, RunnerConfig};
pub use runner::{Results, Runner, Summary, TestResult, TestStatus};
pub use schema::{SuiteSpec, TestSpec, TestType};
pub use snapshot::{FsSnapshotStore, SnapshotStore};
