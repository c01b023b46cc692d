//! Task Executor (§4.D, §6): an external collaborator. PACC runs it
//! inside a worktree and records whatever it reports; PACC does not
//! interpret `output`, `metrics`, or `total_cost`.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::sync::Cancel;
use crate::task::Task;

/// What a `TaskExecutor` reports back for a single run, before the
/// orchestrator stamps in `duration`, `branch`, and `worktree_path`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorOutput {
    pub success: bool,
    pub output: String,
    pub files: Vec<String>,
    pub metrics: HashMap<String, i64>,
    pub total_cost: f64,
}

/// Runs a task inside an isolated worktree.
///
/// An `Err` return is a fatal task failure; a successful call that
/// itself reports `success: false` is equally valid and is *not*
/// surfaced as a top-level error (§7).
pub trait TaskExecutor: Send + Sync {
    fn execute(
        &self,
        cancel: &Cancel,
        task: &Task,
        worktree_path: &Path,
    ) -> anyhow::Result<ExecutorOutput>;
}

/// Lets the coordinator share one executor across the fresh per-wave
/// orchestrators it builds (§4.G) without requiring `E: Clone`.
impl<T: TaskExecutor + ?Sized> TaskExecutor for std::sync::Arc<T> {
    fn execute(
        &self,
        cancel: &Cancel,
        task: &Task,
        worktree_path: &Path,
    ) -> anyhow::Result<ExecutorOutput> {
        (**self).execute(cancel, task, worktree_path)
    }
}
