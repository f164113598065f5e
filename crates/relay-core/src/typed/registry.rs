//! RemoteRegistry - エントリ名 → リモートタスク
//!
//! The fixed set of tasks a remote context can execute. Built during
//! initialization, then shared read-only with the engine.

use std::collections::HashMap;
use std::sync::Arc;

use super::task::{DynRemoteTask, RemoteTask, TypedRemoteTask};

#[derive(Default)]
pub struct RemoteRegistry {
    tasks: HashMap<String, Arc<dyn DynRemoteTask>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Remote task for entry '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl RemoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: RemoteTask>(&mut self, task: T) -> Result<(), RegistryError> {
        let entry = T::ENTRY.to_string();
        if self.tasks.contains_key(&entry) {
            return Err(RegistryError::AlreadyRegistered(entry));
        }
        self.tasks.insert(entry, Arc::new(TypedRemoteTask::new(task)));
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T: RemoteTask>(mut self, task: T) -> Result<Self, RegistryError> {
        self.register(task)?;
        Ok(self)
    }

    pub fn get(&self, entry: &str) -> Option<Arc<dyn DynRemoteTask>> {
        self.tasks.get(entry).cloned()
    }

    pub fn registered_entries(&self) -> Vec<String> {
        let mut entries: Vec<String> = self.tasks.keys().cloned().collect();
        entries.sort();
        entries
    }
}
