//! Worktree Provisioner (§4.C, §6): an external collaborator PACC only
//! consumes through a two-method trait.

mod git;

pub use git::GitWorktreeProvisioner;

/// An isolated on-disk workspace bound to a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub branch: String,
    pub path: std::path::PathBuf,
}

/// Creates and removes isolated on-disk workspaces tied to a branch.
///
/// Modeled as a trait (not a base class) so test doubles are trivial,
/// matching §9's "interface abstraction over inheritance" note and
/// this codebase's own `Box<dyn TerminalBackend>` pattern for pluggable
/// backends.
pub trait WorktreeProvisioner: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create a fresh workspace off `HEAD` on `branch`. Not required to
    /// be idempotent — a second `create` for the same branch may fail.
    fn create(&self, branch: &str) -> Result<Worktree, Self::Error>;

    /// Remove the workspace for `branch`. `force` is advisory; a given
    /// implementation is not required to honor it.
    fn remove(&self, branch: &str, force: bool) -> Result<(), Self::Error>;
}

/// Lets the coordinator share one provisioner across the fresh
/// per-wave orchestrators it builds (§4.G) without requiring `W: Clone`.
impl<T: WorktreeProvisioner + ?Sized> WorktreeProvisioner for std::sync::Arc<T> {
    type Error = T::Error;

    fn create(&self, branch: &str) -> Result<Worktree, Self::Error> {
        (**self).create(branch)
    }

    fn remove(&self, branch: &str, force: bool) -> Result<(), Self::Error> {
        (**self).remove(branch, force)
    }
}
