//! Coordinator (§4.G): the top-level pipeline that composes the scope
//! validator, the per-wave orchestrator, and the merge orchestrator.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::config::PaccConfig;
use crate::error::CoordinatorError;
use crate::events::{ConflictEvent, MergeEvent, PartitionEvent};
use crate::executor::TaskExecutor;
use crate::merge::{MergeConfig, MergeOrchestrator, MergeReport};
use crate::orchestrator::{AgentResult, Orchestrator};
use crate::scope::{check_conflicts, extract_scope, partition_tasks, Conflict, TaskPartition};
use crate::sync::Cancel;
use crate::task::Task;
use crate::worktree::WorktreeProvisioner;

/// Aggregate result of one `execute_parallel` call. Always returned on
/// every path that reaches wave execution — cancellation and wave
/// timeouts are surfaced through `error`, not as a top-level `Err`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub start_time: DateTime<Utc>,
    pub duration: Duration,
    pub target_branch: String,
    pub conflicts: Vec<Conflict>,
    pub partitions: Vec<TaskPartition>,
    pub current_wave: usize,
    pub results: Vec<AgentResult>,
    pub error: Option<String>,
    pub merge_report: Option<MergeReport>,
    pub merge_error: Option<String>,
}

/// Dry-run summary produced by `preview_execution`, without creating
/// worktrees, running executors, or touching the repository (§8.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPreview {
    pub total_tasks: usize,
    pub conflicts: Vec<Conflict>,
    pub partitions: Vec<TaskPartition>,
    pub can_parallel: bool,
    pub requires_waves: bool,
}

type ConflictHandler = Box<dyn Fn(&ConflictEvent) + Send + Sync>;
type PartitionHandler = Box<dyn Fn(&PartitionEvent) + Send + Sync>;
type MergeHandler = Box<dyn Fn(&MergeEvent) + Send + Sync>;

pub struct Coordinator<W, E>
where
    W: WorktreeProvisioner + 'static,
    E: TaskExecutor + 'static,
{
    worktree: Arc<W>,
    executor: Arc<E>,
    merge: MergeOrchestrator,
    config: PaccConfig,
    next_id: AtomicU64,
    run_epoch_ms: u64,
    on_conflict: Mutex<Option<ConflictHandler>>,
    on_partition: Mutex<Option<PartitionHandler>>,
    on_merge: Mutex<Option<MergeHandler>>,
}

impl<W, E> Coordinator<W, E>
where
    W: WorktreeProvisioner + 'static,
    E: TaskExecutor + 'static,
{
    pub fn new(worktree: W, executor: E, repo_root: impl Into<PathBuf>, config: PaccConfig) -> Self {
        let run_epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            worktree: Arc::new(worktree),
            executor: Arc::new(executor),
            merge: MergeOrchestrator::new(repo_root),
            config,
            next_id: AtomicU64::new(0),
            run_epoch_ms,
            on_conflict: Mutex::new(None),
            on_partition: Mutex::new(None),
            on_merge: Mutex::new(None),
        }
    }

    pub fn set_on_conflict<F>(&self, handler: F)
    where
        F: Fn(&ConflictEvent) + Send + Sync + 'static,
    {
        *self.on_conflict.lock().expect("handler lock poisoned") = Some(Box::new(handler));
    }

    pub fn set_on_partition<F>(&self, handler: F)
    where
        F: Fn(&PartitionEvent) + Send + Sync + 'static,
    {
        *self.on_partition.lock().expect("handler lock poisoned") = Some(Box::new(handler));
    }

    pub fn set_on_merge<F>(&self, handler: F)
    where
        F: Fn(&MergeEvent) + Send + Sync + 'static,
    {
        *self.on_merge.lock().expect("handler lock poisoned") = Some(Box::new(handler));
    }

    fn mint_id(&self) -> String {
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("task-{}-{seq}", self.run_epoch_ms)
    }

    /// Mint missing ids/branches up front so scope extraction (which
    /// keys `TaskScope::task_id` off `task.id`) sees a stable id.
    fn normalize(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        for task in &mut tasks {
            if task.id.is_empty() {
                task.id = self.mint_id();
            }
            if task.branch.is_empty() {
                task.branch = format!("agent-{}", task.id);
            }
        }
        tasks
    }

    /// `PreviewExecution`: compute conflicts/partitions without
    /// executing anything.
    pub fn preview_execution(&self, tasks: Vec<Task>) -> ExecutionPreview {
        let tasks = self.normalize(tasks);
        let scopes: Vec<_> = tasks.iter().map(extract_scope).collect();
        let conflicts = check_conflicts(&scopes);
        let partitions = partition_tasks(&scopes);
        ExecutionPreview {
            total_tasks: tasks.len(),
            can_parallel: partitions.len() <= 1,
            requires_waves: partitions.len() > 1,
            conflicts,
            partitions,
        }
    }

    /// `ExecuteParallel`: normalize → partition → run waves → merge.
    pub fn execute_parallel(
        &self,
        cancel: &Cancel,
        tasks: Vec<Task>,
        target_branch: impl Into<String>,
    ) -> Result<ExecutionReport, CoordinatorError> {
        let start_time = Utc::now();
        let start = Instant::now();
        let target_branch = target_branch.into();

        let tasks = self.normalize(tasks);
        let by_id: HashMap<String, Task> = tasks.iter().map(|t| (t.id.clone(), t.clone())).collect();
        let scopes: Vec<_> = tasks.iter().map(extract_scope).collect();
        let conflicts = check_conflicts(&scopes);
        let partitions = partition_tasks(&scopes);

        if !conflicts.is_empty() {
            let event = ConflictEvent {
                timestamp: Utc::now(),
                conflicts: conflicts.clone(),
                message: format!("{} scope conflict(s) detected", conflicts.len()),
            };
            if let Some(handler) = self.on_conflict.lock().expect("handler lock poisoned").as_ref() {
                handler(&event);
            }
        }
        if !tasks.is_empty() {
            let event = PartitionEvent {
                timestamp: Utc::now(),
                partitions: partitions.clone(),
                total_tasks: tasks.len(),
                waves: partitions.len(),
            };
            if let Some(handler) = self.on_partition.lock().expect("handler lock poisoned").as_ref() {
                handler(&event);
            }
        }

        let mut results: Vec<AgentResult> = Vec::new();
        let mut wave_errors: Vec<String> = Vec::new();
        let mut current_wave = 0;
        let mut cancelled = false;

        for partition in &partitions {
            current_wave = partition.group;
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let span = info_span!("wave", group = partition.group, tasks = partition.task_ids.len());
            let _enter = span.enter();

            let mut orchestrator = Orchestrator::new(
                Arc::clone(&self.worktree),
                Arc::clone(&self.executor),
                self.config.orchestrator.clone(),
            );
            orchestrator.start();

            let mut expected = 0usize;
            for task_id in &partition.task_ids {
                if let Some(task) = by_id.get(task_id) {
                    if orchestrator.submit(task.clone()).is_ok() {
                        expected += 1;
                    } else {
                        wave_errors.push(format!("wave {}: failed to submit {task_id}", partition.group));
                    }
                }
            }

            let deadline = Instant::now() + self.config.coordinator.wave_timeout();
            let mut wave_results = Vec::with_capacity(expected);
            let mut timed_out = false;
            while wave_results.len() < expected {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    timed_out = true;
                    break;
                }
                match orchestrator
                    .results()
                    .recv_timeout(remaining.min(Duration::from_millis(200)))
                {
                    Ok(result) => wave_results.push(result),
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }

            orchestrator.stop();

            if timed_out {
                wave_errors.push(format!(
                    "wave {} timed out after {}s",
                    partition.group,
                    self.config.coordinator.wave_timeout_secs
                ));
            }

            let wave_failed = wave_results.iter().any(|r| !r.success);
            if wave_failed {
                warn!(group = partition.group, "wave completed with task failures");
                wave_errors.push(format!("wave {} had task failures", partition.group));
            }

            results.extend(wave_results);

            if cancelled {
                break;
            }
            if wave_failed && self.config.coordinator.stop_on_wave_failure {
                break;
            }
        }

        let error = if cancelled {
            Some("execution cancelled".to_string())
        } else if !wave_errors.is_empty() {
            Some(wave_errors.join("; "))
        } else {
            None
        };

        let mut merge_report = None;
        let mut merge_error = None;
        if !cancelled && self.config.coordinator.auto_merge && !target_branch.is_empty() {
            let merge_cfg = MergeConfig {
                target_branch: target_branch.clone(),
                strategy: self.config.merge.strategy,
                dry_run: self.config.merge.dry_run,
                cleanup_on_merge: self.config.merge.cleanup_on_merge,
                timeout: self.config.merge.timeout(),
            };
            match self.merge.merge_results(cancel, &results, &merge_cfg) {
                Ok(report) => {
                    let event = MergeEvent {
                        timestamp: Utc::now(),
                        report: report.clone(),
                    };
                    if let Some(handler) = self.on_merge.lock().expect("handler lock poisoned").as_ref() {
                        handler(&event);
                    }
                    merge_report = Some(report);
                }
                Err(err) => {
                    merge_error = Some(err.to_string());
                }
            }
        }

        info!(
            waves = partitions.len(),
            results = results.len(),
            merged = merge_report.as_ref().map(|r| r.merged).unwrap_or(0),
            "execution complete"
        );

        Ok(ExecutionReport {
            start_time,
            duration: start.elapsed(),
            target_branch,
            conflicts,
            partitions,
            current_wave,
            results,
            error,
            merge_report,
            merge_error,
        })
    }
}
