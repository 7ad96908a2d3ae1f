//! Build service: turns build references into JSON values or script runs.
//!
//! The engine only talks to the [`BuildService`] trait. [`NixBuildService`]
//! is the default implementation and shells out to `nix build`.

use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// How often a process with a deadline is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Error type for build and script operations.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The build command could not be launched or waited on.
    #[error("failed to run build for {reference}: {source}")]
    Launch {
        reference: String,
        #[source]
        source: ProcessError,
    },

    /// The build command exited unsuccessfully.
    #[error("build for {reference} failed: {status} (stderr: {stderr})")]
    Build {
        reference: String,
        status: String,
        stderr: String,
    },

    /// The build succeeded without printing an output path.
    #[error("build for {reference} produced no output path (stderr: {stderr})")]
    NoOutput { reference: String, stderr: String },

    /// The build output could not be read.
    #[error("failed to read file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The build output is not valid JSON.
    #[error("failed to decode JSON from {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The scratch directory for a script could not be created.
    #[error("failed to create temporary directory: {source}")]
    TempDir {
        #[source]
        source: std::io::Error,
    },

    /// The script could not be launched or waited on.
    #[error("script {} execution failed: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: ProcessError,
    },
}

/// Failure to run a child process to completion.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to wait: {0}")]
    Wait(#[source] std::io::Error),
    #[error("timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),
}

/// Captured result of a script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Resolves build references.
///
/// Implementations are shared by all workers and must tolerate concurrent
/// calls.
pub trait BuildService: Send + Sync {
    /// Build `reference` and parse its output file as JSON.
    fn resolve_json(&self, reference: &str) -> Result<Value, BuildError>;

    /// Build `reference` and run it as a shell script in a scratch directory.
    ///
    /// A non-zero exit is reported through [`ScriptOutput::exit_code`], not
    /// as an error. With `impure_env` unset the script gets an empty
    /// environment.
    fn run_script(&self, reference: &str, impure_env: bool) -> Result<ScriptOutput, BuildError>;
}

/// Build service backed by the `nix` CLI.
#[derive(Debug, Clone)]
pub struct NixBuildService {
    program: String,
    shell: String,
    timeout: Option<Duration>,
}

impl Default for NixBuildService {
    fn default() -> Self {
        Self {
            program: "nix".to_string(),
            shell: "bash".to_string(),
            timeout: None,
        }
    }
}

impl NixBuildService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different executable in place of `nix`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Kill builds and scripts that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a reference and return its first output path.
    pub fn build(&self, reference: &str) -> Result<PathBuf, BuildError> {
        debug!(reference, program = %self.program, "building");

        let mut cmd = Command::new(&self.program);
        cmd.arg("build")
            .arg(format!("{reference}^*"))
            .arg("--print-out-paths")
            .arg("--no-link");

        let output = run_process(&mut cmd, self.timeout).map_err(|source| BuildError::Launch {
            reference: reference.to_string(),
            source,
        })?;

        if !output.status.success() {
            return Err(BuildError::Build {
                reference: reference.to_string(),
                status: output.status.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        output
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| BuildError::NoOutput {
                reference: reference.to_string(),
                stderr: output.stderr.trim().to_string(),
            })
    }
}

impl BuildService for NixBuildService {
    fn resolve_json(&self, reference: &str) -> Result<Value, BuildError> {
        let path = self.build(reference)?;
        let data = std::fs::read(&path).map_err(|source| BuildError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| BuildError::Decode { path, source })
    }

    fn run_script(&self, reference: &str, impure_env: bool) -> Result<ScriptOutput, BuildError> {
        let path = self.build(reference)?;

        let workdir = tempfile::Builder::new()
            .prefix("nixtest-script-")
            .tempdir()
            .map_err(|source| BuildError::TempDir { source })?;

        let mut cmd = Command::new(&self.shell);
        cmd.arg(&path).current_dir(workdir.path());
        if !impure_env {
            cmd.env_clear();
        }

        debug!(script = %path.display(), impure_env, "running script");
        let output = run_process(&mut cmd, self.timeout)
            .map_err(|source| BuildError::Script { path, source })?;

        Ok(ScriptOutput {
            exit_code: exit_code(output.status),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

struct CapturedOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Run a command to completion, capturing stdout and stderr.
///
/// With a timeout the child runs in its own process group. The group is
/// killed once the deadline passes, including when the child has exited but
/// left descendants holding its output pipes open.
fn run_process(
    cmd: &mut Command,
    timeout: Option<Duration>,
) -> Result<CapturedOutput, ProcessError> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let Some(timeout) = timeout else {
        let child = cmd.spawn().map_err(ProcessError::Spawn)?;
        let output = child.wait_with_output().map_err(ProcessError::Wait)?;
        return Ok(CapturedOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    };

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;

    // Pipes are drained on their own threads so a chatty child never blocks
    // on a full pipe while we poll.
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                let now = Instant::now();
                if now >= deadline {
                    terminate(&mut child);
                    return Err(ProcessError::TimedOut(timeout));
                }
                thread::sleep(POLL_INTERVAL.min(deadline - now));
            }
            Err(e) => {
                terminate(&mut child);
                return Err(ProcessError::Wait(e));
            }
        }
    };

    let (Some(stdout), Some(stderr)) = (
        collect_reader(stdout, deadline),
        collect_reader(stderr, deadline),
    ) else {
        terminate(&mut child);
        return Err(ProcessError::TimedOut(timeout));
    };

    Ok(CapturedOutput {
        status,
        stdout,
        stderr,
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Wait for a pipe to close. `None` when it is still open at `deadline`.
fn collect_reader(reader: Option<Receiver<Vec<u8>>>, deadline: Instant) -> Option<String> {
    let Some(rx) = reader else {
        return Some(String::new());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buf) => Some(String::from_utf8_lossy(&buf).into_owned()),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

/// Kill the child and every process left in its group.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .args(["-s", "KILL", "--"])
            .arg(format!("-{}", child.id()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Exit code of a finished process. Signal deaths map to `128 + signal`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
