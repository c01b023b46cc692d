//! Public error types for each PACC component.
//!
//! Each component gets its own `thiserror` enum so callers can match on
//! the failure without downcasting an opaque `anyhow::Error`. Internal
//! plumbing (subprocess output, file I/O) still propagates through
//! `anyhow::Result` and is wrapped into these variants at the boundary.

use thiserror::Error;

/// Errors raised by the scope validator.
///
/// Scope extraction and conflict detection are total, pure functions —
/// this enum exists for forward compatibility and is currently unused
/// by any fallible path in `scope`.
#[derive(Debug, Error)]
pub enum ScopeError {}

/// Errors raised by the file lock manager.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("path must not be empty")]
    EmptyPath,
    #[error("agent id must not be empty")]
    EmptyAgent,
    #[error("no lock held on {path}")]
    NotLocked { path: String },
    #[error("lock on {path} is held by {holder}, not {requester}")]
    NotOwner {
        path: String,
        holder: String,
        requester: String,
    },
    #[error("acquire cancelled while waiting for {path}")]
    Cancelled { path: String },
}

/// Errors raised by the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("task must not be empty")]
    EmptyTask,
    #[error("task queue is full")]
    QueueFull,
    #[error("orchestrator is stopped")]
    Stopped,
    #[error("timed out waiting for agents to drain")]
    WaitTimeout,
    #[error("cleanup failed for {failed} of {total} agents: {details}")]
    CleanupFailed {
        failed: usize,
        total: usize,
        details: String,
    },
    #[error("no running agent for task {task_id}")]
    NoSuchAgent { task_id: String },
}

/// Errors raised by the merge orchestrator.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("failed to checkout target branch {branch}: {source}")]
    CheckoutFailed {
        branch: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("git command failed: {command}: {stderr}")]
    GitCommand { command: String, stderr: String },
}

/// Errors raised by the top-level coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("wave {wave} timed out after {elapsed_secs}s")]
    WaveTimeout { wave: usize, elapsed_secs: u64 },
    #[error("execution cancelled")]
    Cancelled,
}
