//! Scope Validator (§4.A): pure functions over task scopes — overlap
//! detection and greedy-graph-coloring partitioning into waves.

mod conflict;
mod extract;
mod matcher;
mod normalize;
mod partition;
mod types;

pub use conflict::{check_conflicts, has_conflicts};
pub use extract::extract_scope;
pub use partition::partition_tasks;
pub use types::{Conflict, TaskPartition, TaskScope};

#[cfg(test)]
pub use matcher::glob_matches;
