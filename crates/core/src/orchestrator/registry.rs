//! Supervision of detached per-task work.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Kind of detached work attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum JobKind {
    /// Scenario -> fan-out -> persist.
    Continuation,
    /// Copy of the attached images to the artifact store.
    Upload,
}

/// Owns every detached job so it can be cancelled and awaited.
///
/// At most one job of each kind exists per task. Jobs remove themselves when
/// they finish.
pub(crate) struct TaskRegistry {
    root: CancellationToken,
    jobs: Mutex<HashMap<(String, JobKind), JoinHandle<()>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Token cancelled by `shutdown` (or earlier by its holder).
    pub fn token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub fn is_closed(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Spawn `job` for `task_id`. Returns false, without spawning, if the
    /// registry is shut down or the task already has a job of this kind.
    pub fn spawn<F>(self: &Arc<Self>, task_id: &str, kind: JobKind, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = (task_id.to_string(), kind);
        // Held across the spawn so the job cannot deregister before it is
        // registered.
        let mut jobs = self.jobs.lock().unwrap();
        if self.root.is_cancelled() || jobs.contains_key(&key) {
            return false;
        }

        let registry = Arc::clone(self);
        let done_key = key.clone();
        let handle = tokio::spawn(async move {
            job.await;
            registry.jobs.lock().unwrap().remove(&done_key);
        });
        jobs.insert(key, handle);
        true
    }

    pub fn is_running(&self, task_id: &str, kind: JobKind) -> bool {
        self.jobs
            .lock()
            .unwrap()
            .contains_key(&(task_id.to_string(), kind))
    }

    pub fn active(&self, kind: JobKind) -> usize {
        self.jobs
            .lock()
            .unwrap()
            .keys()
            .filter(|(_, k)| *k == kind)
            .count()
    }

    /// Cancel every job and wait up to `timeout` for them to finish.
    /// Returns false if some jobs were still running at the deadline.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.root.cancel();

        let handles: Vec<JoinHandle<()>> = self
            .jobs
            .lock()
            .unwrap()
            .drain()
            .map(|(_, handle)| handle)
            .collect();

        if handles.is_empty() {
            return true;
        }

        tracing::info!(jobs = handles.len(), "Waiting for task jobs to stop");
        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::error!("Task job ended abnormally: {}", e);
                    }
                }
                true
            }
            Err(_) => {
                tracing::warn!("Timed out waiting for task jobs to stop");
                false
            }
        }
    }
}
