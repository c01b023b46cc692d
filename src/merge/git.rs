//! Low-level git subprocess helpers for the merge orchestrator,
//! grounded directly on this codebase's own `git::merge::merge_stage`:
//! checkout → `merge --no-ff` → parse "Already up to date" /
//! "Fast-forward" / "N files changed" stats, or on conflict, parse
//! `git diff --name-only --diff-filter=U` and `merge --abort`.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use wait_timeout::ChildExt;

fn run(repo_root: &Path, args: &[&str]) -> Result<(bool, String)> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .with_context(|| format!("failed to spawn git {args:?}"))?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok((output.status.success(), combined))
}

/// Like `run`, but bounds the subprocess by `timeout` using
/// `wait-timeout` rather than `Command::output()`'s unbounded wait.
/// A timed-out child is killed; its (possibly partial) output is
/// discarded since the caller treats a timeout as a hard failure.
fn run_timed(repo_root: &Path, args: &[&str], timeout: Duration) -> Result<(bool, String)> {
    let mut child = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn git {args:?}"))?;

    match child
        .wait_timeout(timeout)
        .with_context(|| format!("failed to wait on git {args:?}"))?
    {
        Some(status) => {
            let output = child
                .wait_with_output()
                .with_context(|| format!("failed to collect output of git {args:?}"))?;
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            Ok((status.success(), combined))
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(anyhow!("git {args:?} timed out after {timeout:?}"))
        }
    }
}

pub fn current_branch(repo_root: &Path) -> Result<String> {
    let (ok, out) = run(repo_root, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    if !ok {
        return Err(anyhow!("failed to resolve current branch: {out}"));
    }
    Ok(out.trim().to_string())
}

pub fn checkout(repo_root: &Path, branch: &str) -> Result<()> {
    let (ok, out) = run(repo_root, &["checkout", branch])?;
    if !ok {
        return Err(anyhow!("git checkout {branch} failed: {out}"));
    }
    Ok(())
}

/// Best-effort; caller is never allowed to fail because of this.
pub fn abort_merge(repo_root: &Path) {
    let _ = run(repo_root, &["merge", "--abort"]);
}

pub fn probe_merge(repo_root: &Path, branch: &str, timeout: Duration) -> Result<String> {
    let (_, out) = run_timed(repo_root, &["merge", "--no-commit", "--no-ff", branch], timeout)?;
    Ok(out)
}

pub fn real_merge(
    repo_root: &Path,
    branch: &str,
    message: &str,
    strategy_flag: Option<&str>,
    timeout: Duration,
) -> Result<String> {
    let mut args = vec!["merge", "--no-ff", "-m", message];
    if let Some(flag) = strategy_flag {
        args.push("-X");
        args.push(flag);
    }
    args.push(branch);
    let (ok, out) = run_timed(repo_root, &args, timeout)?;
    if !ok {
        return Err(anyhow!("git merge {branch} failed: {out}"));
    }
    Ok(out)
}

pub fn head_hash(repo_root: &Path) -> Option<String> {
    run(repo_root, &["rev-parse", "HEAD"])
        .ok()
        .filter(|(ok, _)| *ok)
        .map(|(_, out)| out.trim().to_string())
}

pub fn delete_branch(repo_root: &Path, branch: &str) {
    let _ = run(repo_root, &["branch", "-D", branch]);
}

/// `CONFLICT ... Merge conflict in <path>` lines, as this codebase's
/// own merge parser extracts them.
pub fn parse_conflict_files(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains("CONFLICT") && line.contains("Merge conflict in "))
        .filter_map(|line| line.split("Merge conflict in ").nth(1))
        .map(|rest| rest.trim().to_string())
        .collect()
}

pub fn looks_like_conflict(output: &str) -> bool {
    output.contains("CONFLICT") || output.contains("Automatic merge failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_conflict_file_list() {
        let output = "Auto-merging file.txt\nCONFLICT (content): Merge conflict in file.txt\nAutomatic merge failed; fix conflicts and then commit the result.\n";
        let files = parse_conflict_files(output);
        assert_eq!(files, vec!["file.txt".to_string()]);
        assert!(looks_like_conflict(output));
    }

    #[test]
    fn clean_output_is_not_a_conflict() {
        assert!(!looks_like_conflict("Already up to date.\n"));
    }
}
