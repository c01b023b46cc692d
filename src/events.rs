//! Observer events emitted by the coordinator.
//!
//! These are plain, cloneable value types rather than a trait hierarchy
//! so a single-slot callback (see [`crate::coordinator::Coordinator`])
//! can hand out an owned copy without holding any internal lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::merge::MergeReport;
use crate::scope::{Conflict, TaskPartition};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictEvent {
    pub timestamp: DateTime<Utc>,
    pub conflicts: Vec<Conflict>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionEvent {
    pub timestamp: DateTime<Utc>,
    pub partitions: Vec<TaskPartition>,
    pub total_tasks: usize,
    pub waves: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeEvent {
    pub timestamp: DateTime<Utc>,
    pub report: MergeReport,
}
