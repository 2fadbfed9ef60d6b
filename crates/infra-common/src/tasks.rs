//! Tracked task spawning with cancellation support
//!
//! Every long-running loop of the monitor (senders, receivers, the stats
//! accumulator) is spawned through a [`TaskManager`] so that shutdown can
//! cancel all of them at once and wait for them with a bound.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{Error, Result};

/// Default time granted to tasks to finish after cancellation
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle to a tracked task
#[derive(Debug)]
struct TaskHandle {
    name: String,
    handle: JoinHandle<()>,
    started_at: Instant,
}

/// Summary of a [`TaskManager::shutdown`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks that returned on their own or on cancellation
    pub completed: usize,
    /// Tasks that had to be aborted after the timeout
    pub aborted: usize,
}

/// Spawns named tasks that all stop when the manager's token is cancelled
pub struct TaskManager {
    name: String,
    cancel_token: CancellationToken,
    tasks: Mutex<Vec<TaskHandle>>,
    shutdown_timeout: Duration,
}

impl TaskManager {
    /// Create a task manager with its own root cancellation token
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cancel_token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Override how long [`shutdown`](Self::shutdown) waits before aborting
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Spawn a tracked task.
    ///
    /// The future is raced against the manager's cancellation token, so a
    /// loop that never returns on its own still stops at its next await
    /// point once the manager is cancelled.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel_token.is_cancelled() {
            return Err(Error::Task(format!(
                "cannot spawn into cancelled task manager {}",
                self.name
            )));
        }

        let task_name = name.into();
        let token = self.cancel_token.clone();
        let manager_name = self.name.clone();
        let label = task_name.clone();

        let handle = tokio::spawn(async move {
            debug!(manager = %manager_name, task = %label, "task started");
            tokio::select! {
                _ = future => {
                    debug!(manager = %manager_name, task = %label, "task completed");
                }
                _ = token.cancelled() => {
                    debug!(manager = %manager_name, task = %label, "task cancelled");
                }
            }
        });

        self.tasks.lock().push(TaskHandle {
            name: task_name,
            handle,
            started_at: Instant::now(),
        });
        Ok(())
    }

    /// Number of tracked tasks that have not finished yet
    pub fn active_task_count(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.handle.is_finished()).count()
    }

    /// Cancel every task without waiting for them
    pub fn cancel_all(&self) {
        debug!(manager = %self.name, "cancelling all tasks");
        self.cancel_token.cancel();
    }

    /// Cancel all tasks and wait for them, aborting stragglers after the timeout
    pub async fn shutdown(&self) -> ShutdownReport {
        debug!(manager = %self.name, active = self.active_task_count(), "shutting down");
        self.cancel_all();

        let tasks: Vec<TaskHandle> = std::mem::take(&mut *self.tasks.lock());
        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;
        let mut report = ShutdownReport::default();

        for mut task in tasks {
            match tokio::time::timeout_at(deadline, &mut task.handle).await {
                Ok(_) => report.completed += 1,
                Err(_) => {
                    warn!(
                        manager = %self.name,
                        task = %task.name,
                        runtime = ?task.started_at.elapsed(),
                        "task did not stop in time, aborting"
                    );
                    task.handle.abort();
                    report.aborted += 1;
                }
            }
        }

        debug!(manager = %self.name, ?report, "shutdown finished");
        report
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
