//! Data types for the scope validator.

use serde::{Deserialize, Serialize};

/// The declared file footprint of a task: explicit paths plus glob
/// patterns, derived from its `files`/`scope` context entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskScope {
    pub task_id: String,
    pub files: Vec<String>,
    pub globs: Vec<String>,
}

impl TaskScope {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.globs.is_empty()
    }
}

/// A detected overlap between two task scopes. Stored once per
/// unordered pair; `task_a`/`task_b` preserve input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub task_a: String,
    pub task_b: String,
    pub overlap_files: Vec<String>,
    pub overlap_globs: Vec<String>,
}

/// A wave of tasks whose scopes pairwise do not conflict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPartition {
    pub group: usize,
    pub task_ids: Vec<String>,
    pub wait_for: Vec<String>,
    pub scopes: Vec<TaskScope>,
}
