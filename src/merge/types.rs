//! Data types for the merge orchestrator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Conflict-handling policy applied at the integration step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Stop and surface the conflict; no further results are processed.
    #[default]
    Pause,
    /// Record and continue with the next result.
    Skip,
    /// Prefer the target-branch side of the conflict.
    Ours,
    /// Prefer the incoming branch's side of the conflict.
    Theirs,
}

/// Outcome of merging a single agent's branch into the target branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    pub task_id: String,
    pub branch: String,
    pub success: bool,
    pub has_conflicts: bool,
    pub conflict_files: Vec<String>,
    pub merge_commit: Option<String>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl MergeResult {
    /// `autoMerged = success ∧ ¬hasConflicts`.
    pub fn auto_merged(&self) -> bool {
        self.success && !self.has_conflicts
    }
}

/// Aggregate report for a `MergeResults` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeReport {
    pub target_branch: String,
    pub results: Vec<MergeResult>,
    pub merged: usize,
    pub conflicts: usize,
    pub failed: usize,
    pub duration: Duration,
}
