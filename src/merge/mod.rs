//! Merge Orchestrator (§4.F): serializes merges of worktree branches
//! into a target branch under a configurable conflict strategy.

mod git;
mod types;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::error::MergeError;
use crate::orchestrator::AgentResult;
use crate::sync::Cancel;

pub use types::{MergeReport, MergeResult, MergeStrategy};

/// Configuration for a single `merge_results` call.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub target_branch: String,
    pub strategy: MergeStrategy,
    pub dry_run: bool,
    pub cleanup_on_merge: bool,
    pub timeout: Duration,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            target_branch: "main".to_string(),
            strategy: MergeStrategy::default(),
            dry_run: false,
            cleanup_on_merge: false,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Guards the mandatory post-probe abort: if `disarm` is never called
/// (early return, panic unwind), `Drop` still issues `git merge
/// --abort`, the same defensive idiom this codebase's lock guards use
/// for best-effort release.
struct AbortGuard<'a> {
    repo_root: &'a Path,
    armed: bool,
}

impl<'a> AbortGuard<'a> {
    fn new(repo_root: &'a Path) -> Self {
        Self {
            repo_root,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            git::abort_merge(self.repo_root);
        }
    }
}

pub struct MergeOrchestrator {
    repo_root: PathBuf,
}

impl MergeOrchestrator {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    /// Fold `results` into `cfg.target_branch`, in order, per §4.F.
    pub fn merge_results(
        &self,
        cancel: &Cancel,
        results: &[AgentResult],
        cfg: &MergeConfig,
    ) -> Result<MergeReport, MergeError> {
        if results.is_empty() {
            return Ok(MergeReport {
                target_branch: cfg.target_branch.clone(),
                ..Default::default()
            });
        }

        let start = Instant::now();
        git::checkout(&self.repo_root, &cfg.target_branch).map_err(|source| {
            MergeError::CheckoutFailed {
                branch: cfg.target_branch.clone(),
                source,
            }
        })?;

        let mut merged = Vec::new();
        for result in results {
            if cancel.is_cancelled() {
                break;
            }
            if !result.success || result.branch.is_empty() {
                merged.push(MergeResult {
                    task_id: result.task_id.clone(),
                    branch: result.branch.clone(),
                    success: false,
                    has_conflicts: false,
                    conflict_files: Vec::new(),
                    merge_commit: None,
                    error: Some("skipped: task did not succeed or has no branch".to_string()),
                    duration: Duration::ZERO,
                });
                continue;
            }

            let outcome = self.merge_one(result, cfg);
            let stop = cfg.strategy == MergeStrategy::Pause && outcome.has_conflicts && !outcome.success;
            merged.push(outcome);
            if stop {
                info!(task_id = %result.task_id, "merge paused on conflict");
                break;
            }
        }

        // `failed` counts every non-success record, including ones that
        // also carry `has_conflicts`; that overlap is intentional, these
        // three counters are independent tallies, not a partition.
        Ok(MergeReport {
            target_branch: cfg.target_branch.clone(),
            merged: merged.iter().filter(|r| r.success).count(),
            conflicts: merged.iter().filter(|r| r.has_conflicts).count(),
            failed: merged.iter().filter(|r| !r.success).count(),
            duration: start.elapsed(),
            results: merged,
        })
    }

    fn merge_one(&self, result: &AgentResult, cfg: &MergeConfig) -> MergeResult {
        let task_id = result.task_id.clone();
        let branch = result.branch.clone();
        let start = Instant::now();

        let probe_output = match git::probe_merge(&self.repo_root, &branch, cfg.timeout) {
            Ok(out) => out,
            Err(err) => {
                git::abort_merge(&self.repo_root);
                return MergeResult {
                    task_id,
                    branch,
                    success: false,
                    has_conflicts: false,
                    conflict_files: Vec::new(),
                    merge_commit: None,
                    error: Some(err.to_string()),
                    duration: start.elapsed(),
                };
            }
        };

        let has_conflicts = git::looks_like_conflict(&probe_output);
        let conflict_files = git::parse_conflict_files(&probe_output);

        // Probe runs with --no-commit; always abort it so the tree is
        // clean before the real merge (or before returning on dry-run).
        let guard = AbortGuard::new(&self.repo_root);
        git::abort_merge(&self.repo_root);
        guard.disarm();

        if cfg.dry_run {
            return MergeResult {
                task_id,
                branch,
                success: !has_conflicts,
                has_conflicts,
                conflict_files,
                merge_commit: None,
                error: if has_conflicts {
                    Some("dry run: conflicts present".to_string())
                } else {
                    None
                },
                duration: start.elapsed(),
            };
        }

        if !has_conflicts {
            let message = format!("Merge agent task {task_id} from {branch}");
            return match git::real_merge(&self.repo_root, &branch, &message, None, cfg.timeout) {
                Ok(_) => {
                    let commit = git::head_hash(&self.repo_root);
                    if cfg.cleanup_on_merge {
                        git::delete_branch(&self.repo_root, &branch);
                    }
                    MergeResult {
                        task_id,
                        branch,
                        success: true,
                        has_conflicts: false,
                        conflict_files,
                        merge_commit: commit,
                        error: None,
                        duration: start.elapsed(),
                    }
                }
                Err(err) => {
                    error!(task_id = %task_id, error = %err, "merge failed after clean probe");
                    MergeResult {
                        task_id,
                        branch,
                        success: false,
                        has_conflicts: false,
                        conflict_files,
                        merge_commit: None,
                        error: Some(err.to_string()),
                        duration: start.elapsed(),
                    }
                }
            };
        }

        match cfg.strategy {
            MergeStrategy::Pause => MergeResult {
                task_id,
                branch,
                success: false,
                has_conflicts: true,
                conflict_files: conflict_files.clone(),
                merge_commit: None,
                error: Some(format!("paused: conflicts in {}", conflict_files.join(", "))),
                duration: start.elapsed(),
            },
            MergeStrategy::Skip => {
                warn!(task_id = %task_id, branch = %branch, "skipping conflicted merge");
                MergeResult {
                    task_id,
                    branch,
                    success: false,
                    has_conflicts: true,
                    conflict_files,
                    merge_commit: None,
                    error: Some("skipped due to conflicts".to_string()),
                    duration: start.elapsed(),
                }
            }
            MergeStrategy::Ours | MergeStrategy::Theirs => {
                let flag = if cfg.strategy == MergeStrategy::Ours {
                    "ours"
                } else {
                    "theirs"
                };
                let message = format!("Merge agent task {task_id} from {branch}");
                match git::real_merge(&self.repo_root, &branch, &message, Some(flag), cfg.timeout) {
                    Ok(_) => {
                        let commit = git::head_hash(&self.repo_root);
                        if cfg.cleanup_on_merge {
                            git::delete_branch(&self.repo_root, &branch);
                        }
                        MergeResult {
                            task_id,
                            branch,
                            success: true,
                            has_conflicts: true,
                            conflict_files,
                            merge_commit: commit,
                            error: None,
                            duration: start.elapsed(),
                        }
                    }
                    Err(err) => MergeResult {
                        task_id,
                        branch,
                        success: false,
                        has_conflicts: true,
                        conflict_files,
                        merge_commit: None,
                        error: Some(err.to_string()),
                        duration: start.elapsed(),
                    },
                }
            }
        }
    }
}
