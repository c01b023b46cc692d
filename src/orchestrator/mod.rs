//! Orchestrator (§4.E): fixed-size worker pool, FIFO task queue,
//! result channel, per-agent status table.

mod manager;
mod types;

pub use manager::Orchestrator;
pub use types::{AgentRecord, AgentResult, AgentStatus, OrchestratorSummary};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::OrchestratorConfig;
    use crate::executor::{ExecutorOutput, TaskExecutor};
    use crate::sync::Cancel;
    use crate::task::Task;
    use crate::worktree::{Worktree, WorktreeProvisioner};

    use super::Orchestrator;

    #[derive(thiserror::Error, Debug)]
    #[error("stub worktree error")]
    struct StubWorktreeError;

    struct StubWorktree {
        created: AtomicUsize,
    }

    impl WorktreeProvisioner for StubWorktree {
        type Error = StubWorktreeError;

        fn create(&self, branch: &str) -> Result<Worktree, Self::Error> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Worktree {
                branch: branch.to_string(),
                path: PathBuf::from(format!("/tmp/stub/{branch}")),
            })
        }

        fn remove(&self, _branch: &str, _force: bool) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    struct AlwaysSucceeds;

    impl TaskExecutor for AlwaysSucceeds {
        fn execute(
            &self,
            _cancel: &Cancel,
            task: &Task,
            _worktree_path: &Path,
        ) -> anyhow::Result<ExecutorOutput> {
            Ok(ExecutorOutput {
                success: true,
                output: format!("ran {}", task.id),
                files: vec![],
                metrics: HashMap::new(),
                total_cost: 0.1,
            })
        }
    }

    #[test]
    fn n_submits_yield_n_distinct_results() {
        let worktree = StubWorktree {
            created: AtomicUsize::new(0),
        };
        let mut orchestrator = Orchestrator::new(
            worktree,
            AlwaysSucceeds,
            OrchestratorConfig {
                max_agents: 2,
                task_queue_size: 10,
                result_queue_size: 10,
            },
        );
        orchestrator.start();

        let mut submitted_ids = Vec::new();
        for i in 0..5 {
            let id = orchestrator
                .submit(Task::new(format!("t{i}"), "do work"))
                .expect("submit");
            submitted_ids.push(id);
        }

        let mut collected = Vec::new();
        for _ in 0..5 {
            let result = orchestrator
                .results()
                .recv_timeout(Duration::from_secs(5))
                .expect("result");
            collected.push(result);
        }

        orchestrator.stop();

        assert_eq!(collected.len(), 5);
        let mut got_ids: Vec<String> = collected.iter().map(|r| r.task_id.clone()).collect();
        got_ids.sort();
        let mut expected_ids = submitted_ids.clone();
        expected_ids.sort();
        assert_eq!(got_ids, expected_ids);
        assert!(collected.iter().all(|r| r.success));
    }

    #[test]
    fn submit_mints_id_and_branch_when_absent() {
        let worktree = StubWorktree {
            created: AtomicUsize::new(0),
        };
        let mut orchestrator = Orchestrator::new(
            worktree,
            AlwaysSucceeds,
            OrchestratorConfig::default(),
        );
        orchestrator.start();
        let id = orchestrator.submit(Task::new("", "prompt")).expect("submit");
        assert!(!id.is_empty());
        let result = orchestrator
            .results()
            .recv_timeout(Duration::from_secs(5))
            .expect("result");
        assert_eq!(result.branch, format!("agent-{id}"));
        orchestrator.stop();
    }

    #[test]
    fn non_positive_config_values_fall_back_to_defaults() {
        let worktree = StubWorktree {
            created: AtomicUsize::new(0),
        };
        let orchestrator = Orchestrator::new(
            worktree,
            AlwaysSucceeds,
            OrchestratorConfig {
                max_agents: 0,
                task_queue_size: 0,
                result_queue_size: 0,
            },
        );
        assert_eq!(orchestrator.get_summary().total(), 0);
    }

    #[test]
    fn wait_times_out_while_agents_are_running() {
        struct NeverReturns;
        impl TaskExecutor for NeverReturns {
            fn execute(
                &self,
                _cancel: &Cancel,
                _task: &Task,
                _worktree_path: &Path,
            ) -> anyhow::Result<ExecutorOutput> {
                std::thread::sleep(Duration::from_secs(10));
                Ok(ExecutorOutput::default())
            }
        }

        let worktree = StubWorktree {
            created: AtomicUsize::new(0),
        };
        let mut orchestrator = Orchestrator::new(
            worktree,
            NeverReturns,
            OrchestratorConfig {
                max_agents: 1,
                task_queue_size: 5,
                result_queue_size: 5,
            },
        );
        orchestrator.start();
        orchestrator.submit(Task::new("slow", "prompt")).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        let outcome = orchestrator.wait(Duration::from_millis(100));
        assert!(outcome.is_err());
    }

    #[test]
    fn duplicate_files_from_executor_are_deduped_in_order() {
        struct DuplicatingExecutor;
        impl TaskExecutor for DuplicatingExecutor {
            fn execute(
                &self,
                _cancel: &Cancel,
                task: &Task,
                _worktree_path: &Path,
            ) -> anyhow::Result<ExecutorOutput> {
                Ok(ExecutorOutput {
                    success: true,
                    output: format!("ran {}", task.id),
                    files: vec!["a.go".to_string(), "b.go".to_string(), "a.go".to_string()],
                    metrics: HashMap::new(),
                    total_cost: 0.1,
                })
            }
        }

        let worktree = StubWorktree {
            created: AtomicUsize::new(0),
        };
        let mut orchestrator = Orchestrator::new(worktree, DuplicatingExecutor, OrchestratorConfig::default());
        orchestrator.start();
        orchestrator.submit(Task::new("t", "prompt")).expect("submit");
        let result = orchestrator
            .results()
            .recv_timeout(Duration::from_secs(5))
            .expect("result");
        orchestrator.stop();

        assert_eq!(result.files, vec!["a.go".to_string(), "b.go".to_string()]);
    }

    #[test]
    fn cancel_unknown_task_is_an_error() {
        let worktree = StubWorktree {
            created: AtomicUsize::new(0),
        };
        let orchestrator = Orchestrator::new(worktree, AlwaysSucceeds, OrchestratorConfig::default());
        assert!(orchestrator.cancel("nonexistent").is_err());
    }

    #[test]
    fn empty_task_is_rejected() {
        let worktree = StubWorktree {
            created: AtomicUsize::new(0),
        };
        let orchestrator = Orchestrator::new(worktree, AlwaysSucceeds, OrchestratorConfig::default());
        assert!(orchestrator.submit(Task::default()).is_err());
    }
}
