//! Status - 登録中タスクのスナップショット

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{LambdaId, LambdaState};

/// One handler as seen from the outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatus {
    pub lambda_id: LambdaId,
    pub entry: String,
    pub state: LambdaState,
    pub pinned: bool,
    pub bridges: Vec<String>,
    pub exports: Vec<String>,
    pub pending_callbacks: usize,
    pub launched_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Counts over every registered handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryStatus {
    pub running: usize,
    pub pinned: usize,
    pub pending_callbacks: usize,
    pub tasks: Vec<TaskStatus>,
}

impl RegistryStatus {
    pub fn from_tasks(tasks: Vec<TaskStatus>) -> Self {
        let running = tasks
            .iter()
            .filter(|t| matches!(t.state, LambdaState::Created | LambdaState::Running))
            .count();
        let pinned = tasks
            .iter()
            .filter(|t| t.state == LambdaState::CompletedPinned)
            .count();
        let pending_callbacks = tasks.iter().map(|t| t.pending_callbacks).sum();
        Self {
            running,
            pinned,
            pending_callbacks,
            tasks,
        }
    }

    pub fn total(&self) -> usize {
        self.tasks.len()
    }
}
