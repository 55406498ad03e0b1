//! Background task registry.
//!
//! Spawns long-running workers and tracks them under opaque ids, each with a
//! cooperative cancellation flag. Workers are expected to poll their
//! [`CancelFlag`] at every loop iteration and at blocking-call boundaries;
//! forced abort is available but abandons in-flight BLE operations.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Identifier for a spawned background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Cooperative cancellation flag handed to each worker.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

struct TaskEntry {
    cancel: CancelFlag,
    handle: tokio::task::JoinHandle<()>,
}

/// Registry of long-running background workers.
#[derive(Default)]
pub struct BackgroundTaskRegistry {
    tasks: RwLock<HashMap<u64, TaskEntry>>,
    next_id: AtomicU64,
}

impl BackgroundTaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a worker and register it under a fresh id.
    ///
    /// The worker receives a [`CancelFlag`] it must poll cooperatively.
    pub fn spawn<F, Fut>(&self, entry: F) -> TaskId
    where
        F: FnOnce(CancelFlag) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancelFlag::default();
        let handle = tokio::spawn(entry(cancel.clone()));

        debug!("Spawned background task {}", id);
        self.tasks.write().insert(id, TaskEntry { cancel, handle });

        TaskId(id)
    }

    /// Request cancellation of a task. Returns false if the id is unknown.
    ///
    /// With `force` the task is additionally aborted at its next await point,
    /// which may abandon an in-flight operation. Prefer cooperative
    /// cancellation.
    pub fn request_cancel(&self, id: TaskId, force: bool) -> bool {
        let tasks = self.tasks.read();
        let Some(entry) = tasks.get(&id.0) else {
            return false;
        };

        entry.cancel.cancel();

        if force {
            warn!("Force-aborting background task {}", id.0);
            entry.handle.abort();
        }

        true
    }

    /// True iff the task exists, has not been asked to cancel, and its
    /// worker has not finished.
    pub fn is_alive(&self, id: TaskId) -> bool {
        self.tasks
            .read()
            .get(&id.0)
            .map(|entry| !entry.cancel.is_cancelled() && !entry.handle.is_finished())
            .unwrap_or(false)
    }

    /// Wait for a task to finish and remove it from the registry.
    ///
    /// No-op for unknown ids. A panicked or aborted worker is logged and
    /// swallowed.
    pub async fn join(&self, id: TaskId) {
        let entry = self.tasks.write().remove(&id.0);
        if let Some(entry) = entry {
            if let Err(e) = entry.handle.await {
                if !e.is_cancelled() {
                    warn!("Background task {} failed: {}", id.0, e);
                }
            }
            debug!("Background task {} joined", id.0);
        }
    }

    /// Number of registered tasks (finished tasks remain until joined).
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// True if no tasks are registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }
}

impl Drop for BackgroundTaskRegistry {
    fn drop(&mut self) {
        for entry in self.tasks.read().values() {
            entry.cancel.cancel();
        }
    }
}
