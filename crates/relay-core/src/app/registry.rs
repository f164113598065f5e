//! TaskRegistry - LambdaId → TaskHandler
//!
//! The registry is an ordinary object handed to whoever needs it (launcher,
//! dispatcher, task handles). Several independent relays can coexist in one
//! process.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::handler::TaskHandler;
use crate::domain::{LambdaId, RelayError};

/// TaskRegistry は実行中タスクのライフサイクルの正本
///
/// # 不変条件
/// - 登録済みの LambdaId はちょうど 1 つの handler に対応する
/// - register / lookup / remove は Mutex で相互排他
#[derive(Default)]
pub struct TaskRegistry {
    handlers: Mutex<HashMap<LambdaId, Arc<TaskHandler>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a handler under its current lambda id.
    pub fn register(&self, handler: Arc<TaskHandler>) -> Result<(), RelayError> {
        let lambda = handler.lambda_id();
        let mut handlers = self.handlers.lock();
        if handlers.contains_key(&lambda) {
            return Err(RelayError::DuplicateLambda(lambda));
        }
        handlers.insert(lambda, handler);
        Ok(())
    }

    pub fn lookup(&self, lambda: LambdaId) -> Option<Arc<TaskHandler>> {
        self.handlers.lock().get(&lambda).cloned()
    }

    pub fn remove(&self, lambda: LambdaId) -> Option<Arc<TaskHandler>> {
        self.handlers.lock().remove(&lambda)
    }

    /// Remove `handler` only if it is still the one registered under its id.
    pub fn remove_handler(&self, handler: &Arc<TaskHandler>) -> bool {
        let mut handlers = self.handlers.lock();
        let lambda = handler.lambda_id();
        match handlers.get(&lambda) {
            Some(current) if Arc::ptr_eq(current, handler) => {
                handlers.remove(&lambda);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, lambda: LambdaId) -> bool {
        self.handlers.lock().contains_key(&lambda)
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<LambdaId> {
        let mut ids: Vec<LambdaId> = self.handlers.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<TaskHandler>> {
        let mut handlers: Vec<Arc<TaskHandler>> = self.handlers.lock().values().cloned().collect();
        handlers.sort_by_key(|h| h.lambda_id());
        handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }
}
