//! Runner configuration.
//!
//! [`RunnerConfig`] is the resolved configuration handed to the runner.
//! [`FileConfig`] holds the optional defaults read from `nixtest.yaml`;
//! command-line flags override it.

use crate::filter::InvalidPatternError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_SNAPSHOT_DIR: &str = "./snapshots";

/// Name of the optional configuration file next to the suite document.
pub const CONFIG_FILENAME: &str = "nixtest.yaml";

/// Configuration that prevents a run from starting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    InvalidWorkers,

    #[error("timeout must be greater than zero")]
    InvalidTimeout,

    #[error(transparent)]
    InvalidPattern(#[from] InvalidPatternError),
}

/// Resolved configuration for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Upper bound on concurrently executing tests.
    pub workers: usize,
    pub snapshot_dir: PathBuf,
    /// Overwrite snapshots with the current actual values before comparing.
    pub update_snapshots: bool,
    /// Regex; tests whose name matches are skipped.
    pub skip_pattern: Option<String>,
    /// Run scripts with the caller's environment instead of an empty one.
    pub impure_env: bool,
    /// Deadline for each external command. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            update_snapshots: false,
            skip_pattern: None,
            impure_env: false,
            timeout: None,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Layer file defaults over this configuration.
    ///
    /// A relative `snapshot_dir` in the file is resolved against `base_dir`,
    /// the directory holding the file.
    pub fn apply_file(&mut self, file: &FileConfig, base_dir: &Path) {
        if let Some(workers) = file.workers {
            self.workers = workers;
        }
        if let Some(dir) = &file.snapshot_dir {
            self.snapshot_dir = if dir.is_absolute() {
                dir.clone()
            } else {
                base_dir.join(dir)
            };
        }
        if let Some(skip) = &file.skip {
            self.skip_pattern = Some(skip.clone());
        }
        if let Some(impure) = file.impure {
            self.impure_env = impure;
        }
        if let Some(secs) = file.timeout {
            self.timeout = Some(Duration::from_secs(secs));
        }
    }
}

/// Contents of `nixtest.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Number of parallel workers.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Snapshot directory, relative to this file.
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,

    /// Regex of test names to skip.
    #[serde(default)]
    pub skip: Option<String>,

    /// Inherit the environment for script tests.
    #[serde(default)]
    pub impure: Option<bool>,

    /// Deadline in seconds for builds and scripts.
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Path of a JUnit XML report to write after each run.
    #[serde(default)]
    pub junit: Option<PathBuf>,
}

/// Generate the JSON Schema for `nixtest.yaml`.
pub fn generate_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(FileConfig)
}
