//! Registry of running upload tasks
//!
//! Every upload runs in its own tokio task. The registry keeps the abort
//! handle so a single upload, or all of them, can be cancelled. Whoever
//! removes an entry first (the task through [`TaskRegistry::finish`] or the
//! user through [`TaskRegistry::cancel`]) owns the terminal event.

use crate::model::upload_item::UploadId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

/// Information about an active task
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: UploadId,
    /// Human readable name, the uploaded file name
    pub name: String,
    pub created_at: Instant,
}

struct TaskEntry {
    info: TaskInfo,
    abort_handle: AbortHandle,
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<UploadId, TaskEntry>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistry::default()
    }

    /// Spawn `future` and track it under `id`.
    ///
    /// The entry is inserted before the task can run to completion, so
    /// [`finish`](Self::finish) always finds it unless it was cancelled.
    pub async fn spawn_tracked<F>(&self, id: UploadId, name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().await;
        let join_handle = tokio::spawn(future);
        tasks.insert(
            id,
            TaskEntry {
                info: TaskInfo {
                    id,
                    name: name.into(),
                    created_at: Instant::now(),
                },
                abort_handle: join_handle.abort_handle(),
            },
        );
    }

    /// Called by a task once its work is done. Returns false when the task
    /// was cancelled in the meantime and must stay silent.
    pub async fn finish(&self, id: UploadId) -> bool {
        self.tasks.lock().await.remove(&id).is_some()
    }

    /// Abort the task for `id`. Returns true if it was still running.
    pub async fn cancel(&self, id: UploadId) -> bool {
        let mut tasks = self.tasks.lock().await;
        if let Some(entry) = tasks.remove(&id) {
            tracing::debug!("aborting task {} ({})", id, entry.info.name);
            entry.abort_handle.abort();
            true
        } else {
            false
        }
    }

    /// Abort every task, returning the ids that were still running
    pub async fn cancel_all(&self) -> Vec<UploadId> {
        let mut tasks = self.tasks.lock().await;
        let mut cancelled: Vec<UploadId> = tasks.keys().copied().collect();
        cancelled.sort();
        for entry in tasks.values() {
            entry.abort_handle.abort();
        }
        tasks.clear();
        cancelled
    }

    pub async fn active_tasks(&self) -> Vec<TaskInfo> {
        let tasks = self.tasks.lock().await;
        let mut infos: Vec<TaskInfo> = tasks.values().map(|e| e.info.clone()).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    pub async fn active_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_active(&self, id: UploadId) -> bool {
        self.tasks.lock().await.contains_key(&id)
    }
}
