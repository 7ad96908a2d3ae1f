//! Bounded worker pool.
//!
//! All tests are queued on a jobs channel before any worker starts. A fixed
//! number of scoped threads pull from it until it drains and push their
//! results onto a results channel that is read once every worker has exited.

use crate::dispatch::Dispatcher;
use crate::runner::TestResult;
use crate::schema::{SuiteSpec, TestSpec};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Instant;
use tracing::{debug, error};

pub struct Scheduler<'a> {
    dispatcher: &'a Dispatcher,
    workers: usize,
}

impl<'a> Scheduler<'a> {
    /// `workers` is clamped to at least one.
    pub fn new(dispatcher: &'a Dispatcher, workers: usize) -> Self {
        Self {
            dispatcher,
            workers: workers.max(1),
        }
    }

    /// Run every test of every suite; one result per test, in completion
    /// order.
    pub fn run(&self, suites: &[SuiteSpec]) -> Vec<TestResult> {
        let total: usize = suites.iter().map(|s| s.tests.len()).sum();
        if total == 0 {
            return Vec::new();
        }

        let (job_tx, job_rx) = mpsc::sync_channel::<TestSpec>(total);
        let (result_tx, result_rx) = mpsc::sync_channel::<TestResult>(total);

        for suite in suites {
            for test in &suite.tests {
                let mut job = test.clone();
                job.suite = suite.name.clone();
                // Capacity equals the job count and the receiver is alive.
                if job_tx.send(job).is_err() {
                    break;
                }
            }
        }
        drop(job_tx);

        let jobs = Mutex::new(job_rx);
        let workers = self.workers.min(total);
        debug!(workers, jobs = total, "starting workers");

        thread::scope(|s| {
            for id in 0..workers {
                let jobs = &jobs;
                let results = result_tx.clone();
                s.spawn(move || self.work(id, jobs, results));
            }
        });
        drop(result_tx);

        result_rx.into_iter().collect()
    }

    fn work(
        &self,
        id: usize,
        jobs: &Mutex<Receiver<TestSpec>>,
        results: mpsc::SyncSender<TestResult>,
    ) {
        loop {
            let next = jobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .recv();
            let Ok(spec) = next else {
                break;
            };
            let result = self.dispatch_isolated(&spec);
            if results.send(result).is_err() {
                break;
            }
        }
        debug!(worker = id, "worker finished");
    }

    /// Dispatch one test, turning a panic into an errored result.
    fn dispatch_isolated(&self, spec: &TestSpec) -> TestResult {
        let start = Instant::now();
        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatcher.dispatch(spec))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(suite = %spec.suite, test = %spec.name, "test panicked: {message}");
                TestResult::errored(
                    spec.clone(),
                    format!("[system] test panicked: {message}"),
                    start.elapsed(),
                )
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
