//! `ExtractScope`: derive a [`TaskScope`] from a task's context.

use super::matcher::is_glob;
use super::normalize::{normalize_path, split_csv};
use super::types::TaskScope;
use crate::task::Task;

/// Extract the declared file footprint of a task.
///
/// Entries from both the `files` and `scope` context keys are pooled
/// and then classified individually: any entry containing `...` or
/// `*` is a glob, everything else is an explicit (normalized) file.
/// Absent or empty context entries yield an empty scope, which
/// conflicts with nothing.
pub fn extract_scope(task: &Task) -> TaskScope {
    let mut files = Vec::new();
    let mut globs = Vec::new();

    for entry in split_csv(task.context_files()).into_iter().chain(split_csv(task.context_scope())) {
        if is_glob(&entry) {
            globs.push(entry);
        } else {
            files.push(normalize_path(&entry));
        }
    }

    TaskScope {
        task_id: task.id.clone(),
        files,
        globs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_task_yields_empty_scope() {
        let task = Task::new("t", "prompt");
        let scope = extract_scope(&task);
        assert!(scope.is_empty());
    }

    #[test]
    fn files_and_globs_are_pooled_and_classified() {
        let mut task = Task::new("t", "prompt").with_files("a.go, b.go");
        task.id = "t1".to_string();
        task = task.with_scope("pkg/...");
        let scope = extract_scope(&task);
        assert_eq!(scope.task_id, "t1");
        assert_eq!(scope.files, vec!["a.go".to_string(), "b.go".to_string()]);
        assert_eq!(scope.globs, vec!["pkg/...".to_string()]);
    }

    #[test]
    fn glob_looking_entry_in_files_key_is_still_a_glob() {
        let task = Task::new("t", "prompt").with_files("pkg/...");
        let scope = extract_scope(&task);
        assert!(scope.files.is_empty());
        assert_eq!(scope.globs, vec!["pkg/...".to_string()]);
    }
}
