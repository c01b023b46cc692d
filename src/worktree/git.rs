//! Reference `WorktreeProvisioner` backed by real `git worktree`
//! subprocess calls, grounded on this codebase's own
//! `git::worktree::operations::{create_worktree, remove_worktree}`:
//! branch-per-task naming under a dedicated directory, stale-branch
//! retry on "already exists", `--force` passthrough on removal.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{anyhow, Context};

use super::{Worktree, WorktreeProvisioner};

pub struct GitWorktreeProvisioner {
    repo_root: PathBuf,
    worktrees_dir: PathBuf,
}

impl GitWorktreeProvisioner {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let worktrees_dir = repo_root.join(".pacc-worktrees");
        Self {
            repo_root,
            worktrees_dir,
        }
    }

    fn run_git(&self, args: &[&str]) -> anyhow::Result<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .with_context(|| format!("failed to spawn git {args:?}"))
    }
}

impl WorktreeProvisioner for GitWorktreeProvisioner {
    type Error = anyhow::Error;

    fn create(&self, branch: &str) -> Result<Worktree, Self::Error> {
        let path = self.worktrees_dir.join(branch.replace('/', "-"));
        let path_str = path.to_string_lossy().to_string();

        let output = self.run_git(&["worktree", "add", "-b", branch, &path_str])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("already exists") {
                // Stale branch from a previous failed run; delete and retry once.
                let _ = self.run_git(&["branch", "-D", branch]);
                let retry = self.run_git(&["worktree", "add", "-b", branch, &path_str])?;
                if !retry.status.success() {
                    return Err(anyhow!(
                        "git worktree add {branch} failed after stale-branch retry: {}",
                        String::from_utf8_lossy(&retry.stderr)
                    ));
                }
            } else {
                return Err(anyhow!(
                    "git worktree add {branch} failed: {}",
                    stderr
                ));
            }
        }

        Ok(Worktree {
            branch: branch.to_string(),
            path,
        })
    }

    fn remove(&self, branch: &str, force: bool) -> Result<(), Self::Error> {
        let path = self.worktrees_dir.join(branch.replace('/', "-"));
        let path_str = path.to_string_lossy().to_string();

        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);

        let output = self.run_git(&args)?;
        if !output.status.success() {
            return Err(anyhow!(
                "git worktree remove {branch} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(())
    }
}
