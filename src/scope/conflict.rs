//! `CheckConflicts` / `HasConflicts`: pairwise overlap detection.

use super::matcher::{glob_matches, globs_prefix_overlap};
use super::types::{Conflict, TaskScope};

/// Compute every pairwise overlap, in deterministic order by input
/// position (one [`Conflict`] per unordered pair).
pub fn check_conflicts(scopes: &[TaskScope]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for i in 0..scopes.len() {
        for j in (i + 1)..scopes.len() {
            if let Some(conflict) = pairwise_conflict(&scopes[i], &scopes[j]) {
                conflicts.push(conflict);
            }
        }
    }
    conflicts
}

pub fn has_conflicts(scopes: &[TaskScope]) -> bool {
    for i in 0..scopes.len() {
        for j in (i + 1)..scopes.len() {
            if pairwise_conflict(&scopes[i], &scopes[j]).is_some() {
                return true;
            }
        }
    }
    false
}

/// Two scopes conflict iff a file is shared, a glob in one matches a
/// file in the other, or two globs prefix-overlap.
fn pairwise_conflict(a: &TaskScope, b: &TaskScope) -> Option<Conflict> {
    let mut overlap_files = Vec::new();
    for file in &a.files {
        if b.files.contains(file) && !overlap_files.contains(file) {
            overlap_files.push(file.clone());
        }
    }

    let mut overlap_globs = Vec::new();
    for glob in &a.globs {
        for file in &b.files {
            if glob_matches(glob, file) && !overlap_globs.contains(glob) {
                overlap_globs.push(glob.clone());
            }
        }
    }
    for glob in &b.globs {
        for file in &a.files {
            if glob_matches(glob, file) && !overlap_globs.contains(glob) {
                overlap_globs.push(glob.clone());
            }
        }
    }
    for glob_a in &a.globs {
        for glob_b in &b.globs {
            if globs_prefix_overlap(glob_a, glob_b) {
                if !overlap_globs.contains(glob_a) {
                    overlap_globs.push(glob_a.clone());
                }
                if !overlap_globs.contains(glob_b) {
                    overlap_globs.push(glob_b.clone());
                }
            }
        }
    }

    if overlap_files.is_empty() && overlap_globs.is_empty() {
        return None;
    }

    Some(Conflict {
        task_a: a.task_id.clone(),
        task_b: b.task_id.clone(),
        overlap_files,
        overlap_globs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(id: &str, files: &[&str], globs: &[&str]) -> TaskScope {
        TaskScope {
            task_id: id.to_string(),
            files: files.iter().map(|s| s.to_string()).collect(),
            globs: globs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn identical_files_conflict() {
        let a = scope("a", &["shared.go"], &[]);
        let b = scope("b", &["shared.go"], &[]);
        let conflicts = check_conflicts(&[a, b]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].overlap_files, vec!["shared.go".to_string()]);
    }

    #[test]
    fn disjoint_files_overlapping_globs_conflict() {
        let a = scope("a", &[], &["pkg/..."]);
        let b = scope("b", &[], &["pkg/auth/..."]);
        assert!(has_conflicts(&[a, b]));
    }

    #[test]
    fn disjoint_scopes_do_not_conflict() {
        let a = scope("a", &["a.go"], &[]);
        let b = scope("b", &["b.go"], &[]);
        assert!(!has_conflicts(&[a, b]));
    }

    #[test]
    fn empty_scope_conflicts_with_nothing() {
        let a = scope("a", &[], &[]);
        let b = scope("b", &["b.go"], &["pkg/..."]);
        assert!(!has_conflicts(&[a, b]));
    }
}
