//! Registry for background fetch tasks
//!
//! At most one task per [`FetchKind`] is live. Issuing a fetch of a kind that
//! is still running aborts the older one, so only the latest answer lands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    UiConfig,
    Sample,
    SearchConfig,
    SaveSearchConfig,
    Preview,
    Prompts,
    Csv,
}

pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<FetchKind, JoinHandle<()>>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Track `handle`, aborting any task of the same kind still running
    pub fn register(&self, kind: FetchKind, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = tasks.insert(kind, handle) {
            if !previous.is_finished() {
                tracing::debug!(?kind, "superseding running fetch");
                previous.abort();
            }
        }
    }

    pub fn is_running(&self, kind: FetchKind) -> bool {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.get(&kind).map_or(false, |handle| !handle.is_finished())
    }

    /// Abort every task (on app shutdown)
    pub fn cancel_everything(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

impl Clone for TaskRegistry {
    fn clone(&self) -> Self {
        Self {
            tasks: Arc::clone(&self.tasks),
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
