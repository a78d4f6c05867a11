//! Background Revalidation Tasks
//!
//! Tracks detached tasks (stale-while-revalidate refreshes) so they can be
//! awaited or aborted as a group.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Shared set of spawned, not-yet-reaped task handles.
///
/// Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` on the tokio runtime without waiting for it.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut handles = self.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of spawned tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Waits until every spawned task, including ones spawned while waiting,
    /// has finished.
    pub async fn settle(&self) {
        loop {
            let drained: Vec<JoinHandle<()>> = std::mem::take(&mut *self.lock());
            if drained.is_empty() {
                break;
            }
            debug!(count = drained.len(), "Waiting for background tasks");
            for handle in drained {
                if let Err(err) = handle.await {
                    if err.is_panic() {
                        warn!("Background task panicked: {}", err);
                    }
                }
            }
        }
    }

    /// Aborts every outstanding task.
    pub fn abort_all(&self) {
        for handle in std::mem::take(&mut *self.lock()) {
            handle.abort();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
