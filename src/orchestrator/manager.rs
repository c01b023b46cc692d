//! `Orchestrator` (§4.E): a fixed-size worker pool over
//! `std::thread::spawn` and bounded `std::sync::mpsc` channels —
//! grounded on this codebase's own `verify::criteria::executor`, which
//! already spawns reader threads and hands results back over
//! `mpsc::channel`. There is no async runtime anywhere in this
//! codebase's dependency tree, so the pool is thread-based, not
//! task-based.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::executor::TaskExecutor;
use crate::sync::Cancel;
use crate::task::Task;
use crate::worktree::WorktreeProvisioner;

use super::types::{AgentRecord, AgentResult, AgentStatus, OrchestratorSummary};

/// Poll tick for the worker's queue pop and for `Wait`'s drain poll.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Orchestrator<W, E>
where
    W: WorktreeProvisioner + 'static,
    E: TaskExecutor + 'static,
{
    config: OrchestratorConfig,
    worktree: Arc<W>,
    executor: Arc<E>,
    task_tx: Option<SyncSender<Task>>,
    task_rx: Arc<Mutex<Receiver<Task>>>,
    result_tx: Option<SyncSender<AgentResult>>,
    result_rx: Receiver<AgentResult>,
    agents: Arc<Mutex<HashMap<String, AgentRecord>>>,
    cancel: Cancel,
    workers: Vec<JoinHandle<()>>,
    next_task_seq: Arc<AtomicU64>,
    run_epoch_ms: u64,
    started: bool,
}

impl<W, E> Orchestrator<W, E>
where
    W: WorktreeProvisioner + 'static,
    E: TaskExecutor + 'static,
{
    pub fn new(worktree: W, executor: E, config: OrchestratorConfig) -> Self {
        let config = config.normalized();
        let (task_tx, task_rx) = mpsc::sync_channel(config.task_queue_size);
        let (result_tx, result_rx) = mpsc::sync_channel(config.result_queue_size);
        let run_epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            config,
            worktree: Arc::new(worktree),
            executor: Arc::new(executor),
            task_tx: Some(task_tx),
            task_rx: Arc::new(Mutex::new(task_rx)),
            result_tx: Some(result_tx),
            result_rx,
            agents: Arc::new(Mutex::new(HashMap::new())),
            cancel: Cancel::new(),
            workers: Vec::new(),
            next_task_seq: Arc::new(AtomicU64::new(0)),
            run_epoch_ms,
            started: false,
        }
    }

    fn mint_task_id(&self) -> String {
        let seq = self.next_task_seq.fetch_add(1, Ordering::SeqCst);
        format!("task-{}-{seq}", self.run_epoch_ms)
    }

    /// Non-blocking enqueue. Mints `id`/`branch` if absent.
    pub fn submit(&self, mut task: Task) -> Result<String, OrchestratorError> {
        if task.prompt.is_empty() && task.name.is_empty() && task.id.is_empty() {
            return Err(OrchestratorError::EmptyTask);
        }
        let Some(tx) = &self.task_tx else {
            return Err(OrchestratorError::Stopped);
        };
        if task.id.is_empty() {
            task.id = self.mint_task_id();
        }
        if task.branch.is_empty() {
            task.branch = format!("agent-{}", task.id);
        }
        let task_id = task.id.clone();

        match tx.try_send(task) {
            Ok(()) => Ok(task_id),
            Err(TrySendError::Full(_)) => Err(OrchestratorError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(OrchestratorError::Stopped),
        }
    }

    /// Submit in order; fail fast on the first error.
    pub fn batch_submit(&self, tasks: Vec<Task>) -> Result<Vec<String>, OrchestratorError> {
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            ids.push(self.submit(task)?);
        }
        Ok(ids)
    }

    /// Spawn `max_agents` worker threads.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        let Some(result_tx_template) = self.result_tx.take() else {
            return;
        };

        for worker_index in 0..self.config.max_agents {
            let task_rx = Arc::clone(&self.task_rx);
            let result_tx = result_tx_template.clone();
            let agents = Arc::clone(&self.agents);
            let worktree = Arc::clone(&self.worktree);
            let executor = Arc::clone(&self.executor);
            let cancel = self.cancel.clone();

            let handle = thread::spawn(move || {
                worker_loop(worker_index, &task_rx, &result_tx, &agents, &worktree, &executor, &cancel);
            });
            self.workers.push(handle);
        }
        // `result_tx_template` is dropped here; each worker holds its
        // own clone, so the channel only closes once every worker exits.
    }

    /// Read-only handle to the result stream.
    pub fn results(&self) -> &Receiver<AgentResult> {
        &self.result_rx
    }

    pub fn status(&self, task_id: &str) -> Option<AgentStatus> {
        self.agents
            .lock()
            .expect("agent table poisoned")
            .get(task_id)
            .map(|record| record.status)
    }

    pub fn active_agents(&self) -> usize {
        self.agents
            .lock()
            .expect("agent table poisoned")
            .values()
            .filter(|record| record.status == AgentStatus::Running)
            .count()
    }

    pub fn get_summary(&self) -> OrchestratorSummary {
        let agents = self.agents.lock().expect("agent table poisoned");
        let mut summary = OrchestratorSummary::default();
        for record in agents.values() {
            match record.status {
                AgentStatus::Running => summary.running += 1,
                AgentStatus::Completed => summary.completed += 1,
                AgentStatus::Failed => summary.failed += 1,
                AgentStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    /// Mark a running task's agent `Cancelled`. The task's `Execute`
    /// call is expected to observe `cancel` at its own suspension
    /// points; there is no forced termination.
    pub fn cancel(&self, task_id: &str) -> Result<(), OrchestratorError> {
        let mut agents = self.agents.lock().expect("agent table poisoned");
        match agents.get_mut(task_id) {
            Some(record) if record.status == AgentStatus::Running => {
                record.status = AgentStatus::Cancelled;
                Ok(())
            }
            _ => Err(OrchestratorError::NoSuchAgent {
                task_id: task_id.to_string(),
            }),
        }
    }

    /// Request worktree removal for every agent whose task has
    /// finished (`Completed` or `Failed`); aggregate errors.
    pub fn cleanup(&self) -> Result<(), OrchestratorError> {
        let finished: Vec<(String, String)> = {
            let agents = self.agents.lock().expect("agent table poisoned");
            agents
                .values()
                .filter(|r| matches!(r.status, AgentStatus::Completed | AgentStatus::Failed))
                .map(|r| (r.task_id.clone(), r.branch.clone()))
                .collect()
        };

        let total = finished.len();
        let mut failures = Vec::new();
        for (task_id, branch) in finished {
            if let Err(err) = self.worktree.remove(&branch, true) {
                warn!(task_id = %task_id, branch = %branch, error = %err, "worktree cleanup failed");
                failures.push(format!("{task_id}: {err}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OrchestratorError::CleanupFailed {
                failed: failures.len(),
                total,
                details: failures.join("; "),
            })
        }
    }

    /// Poll until no agents are `Running`, or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Result<(), OrchestratorError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.active_agents() == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(OrchestratorError::WaitTimeout);
            }
            thread::sleep(WORKER_POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
        }
    }

    /// Cancel the internal context, close the task intake, wait for
    /// workers to drain, then let the result channel close.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.task_tx = None; // closes task intake
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        info!("orchestrator stopped, all workers drained");
        // `self.result_tx` is already `None` (taken in `start`); once
        // every worker-held clone is dropped above, `result_rx` observes
        // channel closure and any blocked reader unblocks.
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop<W, E>(
    _worker_index: usize,
    task_rx: &Arc<Mutex<Receiver<Task>>>,
    result_tx: &SyncSender<AgentResult>,
    agents: &Arc<Mutex<HashMap<String, AgentRecord>>>,
    worktree: &Arc<W>,
    executor: &Arc<E>,
    cancel: &Cancel,
) where
    W: WorktreeProvisioner,
    E: TaskExecutor,
{
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let popped = {
            let rx = task_rx.lock().expect("task rx poisoned");
            rx.recv_timeout(WORKER_POLL_INTERVAL)
        };
        match popped {
            Ok(task) => run_one(task, result_tx, agents, worktree, executor, cancel),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn run_one<W, E>(
    task: Task,
    result_tx: &SyncSender<AgentResult>,
    agents: &Arc<Mutex<HashMap<String, AgentRecord>>>,
    worktree: &Arc<W>,
    executor: &Arc<E>,
    cancel: &Cancel,
) where
    W: WorktreeProvisioner,
    E: TaskExecutor,
{
    let started_at = Instant::now();
    agents.lock().expect("agent table poisoned").insert(
        task.id.clone(),
        AgentRecord {
            task_id: task.id.clone(),
            branch: task.branch.clone(),
            status: AgentStatus::Running,
        },
    );

    let wt = match worktree.create(&task.branch) {
        Ok(wt) => wt,
        Err(err) => {
            set_status(agents, &task.id, AgentStatus::Failed);
            deliver(
                cancel,
                result_tx,
                AgentResult {
                    task_id: task.id,
                    success: false,
                    error: Some(format!("worktree create failed: {err}")),
                    duration: started_at.elapsed(),
                    branch: task.branch,
                    ..Default::default()
                },
            );
            return;
        }
    };

    match executor.execute(cancel, &task, &wt.path) {
        Ok(output) => {
            let status = if output.success {
                AgentStatus::Completed
            } else {
                AgentStatus::Failed
            };
            set_status(agents, &task.id, status);
            deliver(
                cancel,
                result_tx,
                AgentResult {
                    task_id: task.id,
                    success: output.success,
                    output: output.output,
                    error: None,
                    duration: started_at.elapsed(),
                    branch: wt.branch,
                    worktree_path: Some(wt.path),
                    files: dedup_preserve_order(output.files),
                    metrics: output.metrics,
                    total_cost: output.total_cost,
                },
            );
        }
        Err(err) => {
            set_status(agents, &task.id, AgentStatus::Failed);
            deliver(
                cancel,
                result_tx,
                AgentResult {
                    task_id: task.id,
                    success: false,
                    error: Some(err.to_string()),
                    duration: started_at.elapsed(),
                    branch: wt.branch,
                    worktree_path: Some(wt.path),
                    ..Default::default()
                },
            );
        }
    }
}

fn set_status(agents: &Arc<Mutex<HashMap<String, AgentRecord>>>, task_id: &str, status: AgentStatus) {
    if let Some(record) = agents.lock().expect("agent table poisoned").get_mut(task_id) {
        // A `Cancel` request may have already flipped this to
        // `Cancelled`; don't clobber it with a late `Completed`/`Failed`.
        if record.status == AgentStatus::Running {
            record.status = status;
        }
    }
}

/// `AgentResult.files` is an ordered *unique* sequence (§3); PACC owns
/// that invariant, not the executor, so dedup whatever it reports
/// while keeping first-seen order.
fn dedup_preserve_order(files: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(files.len());
    files.into_iter().filter(|f| seen.insert(f.clone())).collect()
}

/// Channel send guarded by `cancel` so `Stop` never leaves a worker
/// blocked forever on a full result channel.
fn deliver(cancel: &Cancel, tx: &SyncSender<AgentResult>, mut result: AgentResult) {
    loop {
        match tx.try_send(result) {
            Ok(()) => return,
            Err(TrySendError::Disconnected(_)) => return,
            Err(TrySendError::Full(back)) => {
                if cancel.is_cancelled() {
                    return;
                }
                result = back;
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}
