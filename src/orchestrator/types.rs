//! Data types for the worker-pool orchestrator.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// The orchestrator's bookkeeping entry for one in-flight or completed
/// task; persists in the status table until `Cleanup`.
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub task_id: String,
    pub branch: String,
    pub status: AgentStatus,
}

/// What the orchestrator emits on the result channel for each task,
/// after stamping in `duration`/`branch`/`worktree_path` per the
/// worker loop (§4.E).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentResult {
    pub task_id: String,
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub duration: Duration,
    pub branch: String,
    pub worktree_path: Option<PathBuf>,
    pub files: Vec<String>,
    pub metrics: HashMap<String, i64>,
    pub total_cost: f64,
}

/// Counts by state, as returned by `GetSummary`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorSummary {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl OrchestratorSummary {
    pub fn total(&self) -> usize {
        self.running + self.completed + self.failed + self.cancelled
    }
}
