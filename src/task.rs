//! The unit of work submitted to the coordination core.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Context key carrying comma-separated explicit file paths.
pub const CONTEXT_FILES_KEY: &str = "files";
/// Context key carrying comma-separated glob patterns.
pub const CONTEXT_SCOPE_KEY: &str = "scope";

/// A single agent run request.
///
/// `id` and `branch` may be left empty by the caller; the orchestrator
/// mints a unique id and derives a branch name (`agent-<id>`) for any
/// task submitted without them. PACC does not interpret `context`
/// beyond the `files`/`scope` keys — everything else passes through to
/// the [`crate::executor::TaskExecutor`] untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl Task {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            branch: String::new(),
            prompt: prompt.into(),
            priority: 0,
            context: HashMap::new(),
        }
    }

    pub fn with_files(mut self, files: impl Into<String>) -> Self {
        self.context.insert(CONTEXT_FILES_KEY.to_string(), files.into());
        self
    }

    pub fn with_scope(mut self, globs: impl Into<String>) -> Self {
        self.context.insert(CONTEXT_SCOPE_KEY.to_string(), globs.into());
        self
    }

    pub fn context_files(&self) -> &str {
        self.context
            .get(CONTEXT_FILES_KEY)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn context_scope(&self) -> &str {
        self.context
            .get(CONTEXT_SCOPE_KEY)
            .map(String::as_str)
            .unwrap_or("")
    }
}
