use clap::{Parser, Subcommand, ValueEnum};
use nixtest::config::{FileConfig, RunnerConfig};
use nixtest::report::{console, json, junit};
use nixtest::schema::{SuiteSpec, TestSpec, TestType};
use nixtest::{FsSnapshotStore, NixBuildService, Runner, loader};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Failure details and a summary table
    #[default]
    Human,
    /// Machine-readable JSON output
    Json,
    /// JUnit XML output for CI systems
    Junit,
}

#[derive(Parser)]
#[command(name = "nixtest")]
#[command(about = "A parallel test runner for Nix-built unit, snapshot and script tests")]
#[command(version)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute the tests in a suite document
    Run {
        /// Path to the suite document (JSON, YAML or TOML)
        tests: PathBuf,
        /// Number of tests to run in parallel
        #[arg(short, long)]
        workers: Option<usize>,
        /// Directory holding snapshot files
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
        /// Overwrite snapshots with the current values
        #[arg(short, long)]
        update_snapshots: bool,
        /// Skip tests whose name matches this regex
        #[arg(short, long)]
        skip: Option<String>,
        /// Run script tests with the current environment
        #[arg(long)]
        impure: bool,
        /// Kill builds and scripts after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Also write a JUnit XML report to this path
        #[arg(long)]
        junit: Option<PathBuf>,
        /// Output format
        #[arg(short, long, default_value = "human")]
        output: OutputFormat,
        /// Disable colored console output
        #[arg(long)]
        no_color: bool,
    },
    /// Validate a suite document without running it
    Validate {
        /// Path to the suite document
        tests: PathBuf,
    },
    /// Output the suite document schema
    Schema {
        /// Print the schema of nixtest.yaml instead
        #[arg(long)]
        config: bool,
    },
}

/// Where and how `run` reports results.
struct Output {
    format: OutputFormat,
    junit: Option<PathBuf>,
    use_color: bool,
}

/// Flags of `run` that override the configuration file.
struct RunOverrides {
    workers: Option<usize>,
    snapshot_dir: Option<PathBuf>,
    update_snapshots: bool,
    skip: Option<String>,
    impure: bool,
    timeout: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run {
            tests,
            workers,
            snapshot_dir,
            update_snapshots,
            skip,
            impure,
            timeout,
            junit,
            output,
            no_color,
        } => {
            let overrides = RunOverrides {
                workers,
                snapshot_dir,
                update_snapshots,
                skip,
                impure,
                timeout,
            };
            let output = Output {
                format: output,
                junit,
                use_color: !no_color && std::io::stdout().is_terminal(),
            };
            std::process::exit(run(&tests, overrides, output));
        }
        Command::Validate { tests } => {
            let suites = load_or_exit(&tests);

            let mut problems = 0;
            for suite in &suites {
                println!("✓ {} ({} tests)", suite.name, suite.tests.len());
                for test in &suite.tests {
                    if let Some(problem) = validation_problem(test) {
                        eprintln!("✗ {}/{}: {problem}", suite.name, test.name);
                        problems += 1;
                    }
                }
            }

            if problems > 0 {
                eprintln!("\n{problems} test(s) failed validation");
                std::process::exit(1);
            }
            println!("\nAll {} suite(s) valid", suites.len());
        }
        Command::Schema { config } => {
            let schema = if config {
                nixtest::config::generate_schema()
            } else {
                nixtest::schema::generate_schema()
            };
            match serde_json::to_string_pretty(&schema) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing schema: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .try_init();
}

/// Run a suite document and return the process exit code.
fn run(tests: &Path, overrides: RunOverrides, output: Output) -> i32 {
    let suites = load_or_exit(tests);

    let base_dir = tests.parent().unwrap_or(Path::new(""));
    let file_config = match loader::load_file_config(base_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return 1;
        }
    };

    let config = resolve_config(file_config.as_ref(), base_dir, overrides);
    let junit_path = output.junit.or_else(|| {
        file_config
            .as_ref()
            .and_then(|c| c.junit.as_ref())
            .map(|p| base_dir.join(p))
    });
    debug!(?config, ?junit_path, "resolved configuration");

    let build = NixBuildService::new().with_timeout(config.timeout);
    let runner = match Runner::new(config, Arc::new(build), Arc::new(FsSnapshotStore)) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    let results = runner.run(&suites);

    match output.format {
        OutputFormat::Human => print!("{}", console::render(&results, output.use_color)),
        OutputFormat::Json => match json::render(&results) {
            Ok(out) => print!("{out}"),
            Err(e) => {
                eprintln!("Error: {e}");
                return 1;
            }
        },
        OutputFormat::Junit => print!("{}", junit::format_junit_xml("nixtest", &results)),
    }

    if let Some(path) = junit_path
        && let Err(e) = junit::write_file(&path, "nixtest", &results)
    {
        eprintln!("Error: {e}");
        return 1;
    }

    if results.summary().is_success() { 0 } else { 2 }
}

/// Layer built-in defaults, the config file and command-line flags.
fn resolve_config(
    file: Option<&FileConfig>,
    base_dir: &Path,
    overrides: RunOverrides,
) -> RunnerConfig {
    let mut config = RunnerConfig::default();
    if let Some(file) = file {
        config.apply_file(file, base_dir);
    }

    if let Some(workers) = overrides.workers {
        config.workers = workers;
    }
    if let Some(dir) = overrides.snapshot_dir {
        config.snapshot_dir = dir;
    }
    if let Some(skip) = overrides.skip {
        config.skip_pattern = Some(skip);
    }
    if let Some(secs) = overrides.timeout {
        config.timeout = Some(Duration::from_secs(secs));
    }
    config.update_snapshots |= overrides.update_snapshots;
    config.impure_env |= overrides.impure;
    config
}

fn load_or_exit(path: &Path) -> Vec<SuiteSpec> {
    match loader::load_suites(path) {
        Ok(suites) => suites,
        Err(e) => {
            eprintln!("Error loading {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn validation_problem(test: &TestSpec) -> Option<String> {
    match &test.test_type {
        TestType::Unknown(kind) => Some(format!("invalid test type {kind:?}")),
        TestType::Script if test.script_ref().is_none() => {
            Some("script test has no script derivation".to_string())
        }
        TestType::Snapshot if test.actual_ref().is_none() && test.actual.is_none() => {
            Some("snapshot test has neither actual nor actualDrv".to_string())
        }
        _ => None,
    }
}
