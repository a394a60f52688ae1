//! Background Task Runner
//!
//! Runs best-effort work off the caller's path. Submissions never wait: a
//! task is dropped when every slot is busy, when a task with the same key is
//! still running, or when there is no tokio runtime to run it on. Nothing is
//! persisted, so queued work is lost on restart.
//!
//! Failures are sent over a channel to a sink task that logs them.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, warn};

use crate::SDKResult;

/// What happened to a submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Spawned and running
    Spawned,
    /// A task with the same key is still running
    Duplicate,
    /// Every slot is busy
    Saturated,
    /// No tokio runtime on this thread
    NoRuntime,
}

/// A failed background task
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub key: String,
    pub error: String,
}

#[derive(Debug, Default)]
struct RunnerCounters {
    spawned: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    dropped_duplicate: AtomicU64,
    dropped_saturated: AtomicU64,
    dropped_no_runtime: AtomicU64,
}

/// Snapshot of runner counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunnerStats {
    pub spawned: u64,
    pub completed: u64,
    pub failed: u64,
    pub dropped_duplicate: u64,
    pub dropped_saturated: u64,
    pub dropped_no_runtime: u64,
    pub running: usize,
}

/// Removes a key from the in-flight set when the task ends, even on panic
struct InFlightGuard {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut keys) = self.in_flight.lock() {
            keys.remove(&self.key);
        }
    }
}

/// Bounded, single-flight background task runner
pub struct TaskRunner {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    in_flight: Arc<Mutex<HashSet<String>>>,
    counters: Arc<RunnerCounters>,
    failures: mpsc::UnboundedSender<TaskFailure>,
}

impl TaskRunner {
    /// Create a runner allowing `max_concurrent` tasks at once.
    ///
    /// The failure sink is spawned on the current runtime if there is one.
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (failures, rx) = mpsc::unbounded_channel();

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(drain_failures(rx));
            }
            Err(_) => {
                debug!("No runtime for task failure sink; failures will be logged inline");
                drop(rx);
            }
        }

        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            counters: Arc::new(RunnerCounters::default()),
            failures,
        }
    }

    /// Submit `task` under `key` without waiting for it.
    pub fn submit<F>(&self, key: impl Into<String>, task: F) -> Submission
    where
        F: Future<Output = SDKResult<()>> + Send + 'static,
    {
        let key = key.into();

        let Ok(handle) = Handle::try_current() else {
            warn!(task = %key, "No runtime available, dropping background task");
            self.counters.dropped_no_runtime.fetch_add(1, Ordering::Relaxed);
            return Submission::NoRuntime;
        };

        let permit = {
            let Ok(mut keys) = self.in_flight.lock() else {
                return Submission::Saturated;
            };
            if keys.contains(&key) {
                debug!(task = %key, "Background task already running, dropping duplicate");
                self.counters.dropped_duplicate.fetch_add(1, Ordering::Relaxed);
                return Submission::Duplicate;
            }

            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                warn!(task = %key, max_concurrent = self.max_concurrent, "Task runner saturated, dropping background task");
                self.counters.dropped_saturated.fetch_add(1, Ordering::Relaxed);
                return Submission::Saturated;
            };

            keys.insert(key.clone());
            permit
        };

        self.counters.spawned.fetch_add(1, Ordering::Relaxed);
        let guard = InFlightGuard {
            key: key.clone(),
            in_flight: self.in_flight.clone(),
        };
        let counters = self.counters.clone();
        let failures = self.failures.clone();

        handle.spawn(async move {
            let _permit = permit;
            let _guard = guard;

            match task.await {
                Ok(()) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    let failure = TaskFailure {
                        key,
                        error: e.to_string(),
                    };
                    if let Err(mpsc::error::SendError(failure)) = failures.send(failure) {
                        error!(task = %failure.key, error = %failure.error, "Background task failed");
                    }
                }
            }
        });

        Submission::Spawned
    }

    /// Counter snapshot
    pub fn stats(&self) -> RunnerStats {
        RunnerStats {
            spawned: self.counters.spawned.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped_duplicate: self.counters.dropped_duplicate.load(Ordering::Relaxed),
            dropped_saturated: self.counters.dropped_saturated.load(Ordering::Relaxed),
            dropped_no_runtime: self.counters.dropped_no_runtime.load(Ordering::Relaxed),
            running: self.max_concurrent - self.semaphore.available_permits(),
        }
    }

    /// Wait until no task is running.
    pub async fn wait_idle(&self) {
        // Holding every permit at once means nothing else holds one
        if let Ok(permits) = self.semaphore.acquire_many(self.max_concurrent as u32).await {
            drop(permits);
        }
    }
}

async fn drain_failures(mut rx: mpsc::UnboundedReceiver<TaskFailure>) {
    while let Some(failure) = rx.recv().await {
        error!(task = %failure.key, error = %failure.error, "Background task failed");
    }
}
