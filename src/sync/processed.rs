//! Ids of executions already reported to Qase.

use std::collections::HashSet;
use std::sync::Mutex;

/// Where reported execution ids are remembered. Entries are never removed.
pub trait ProcessedStore: Send + Sync {
    fn contains(&self, execution_id: &str) -> bool;
    fn add(&self, execution_id: &str);
}

/// Process-lifetime store; forgotten on restart.
#[derive(Debug, Default)]
pub struct InMemoryProcessed {
    ids: Mutex<HashSet<String>>,
}

impl InMemoryProcessed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A poisoned set is still a valid set of ids.
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProcessedStore for InMemoryProcessed {
    fn contains(&self, execution_id: &str) -> bool {
        self.lock().contains(execution_id)
    }

    fn add(&self, execution_id: &str) {
        self.lock().insert(execution_id.to_string());
    }
}
