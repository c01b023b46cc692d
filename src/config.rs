//! Top-level configuration for the coordination core.
//!
//! `PaccConfig` is meant to be embedded inside a larger host document
//! (unlike a leaf CLI config), so unlike this codebase's other
//! `#[serde(deny_unknown_fields)]` configs, sibling keys are tolerated
//! here. Every field has a `default_*` function so a partial or absent
//! config file still yields a usable [`PaccConfig::default`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::merge::MergeStrategy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaccConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

impl Default for PaccConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            lock: LockConfig::default(),
            merge: MergeConfig::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }
}

fn default_max_agents() -> usize {
    4
}
fn default_task_queue_size() -> usize {
    100
}
fn default_result_queue_size() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    #[serde(default = "default_task_queue_size")]
    pub task_queue_size: usize,
    #[serde(default = "default_result_queue_size")]
    pub result_queue_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
            task_queue_size: default_task_queue_size(),
            result_queue_size: default_result_queue_size(),
        }
    }
}

impl OrchestratorConfig {
    /// Non-positive inputs fall back to defaults.
    pub fn normalized(&self) -> Self {
        Self {
            max_agents: if self.max_agents == 0 {
                default_max_agents()
            } else {
                self.max_agents
            },
            task_queue_size: if self.task_queue_size == 0 {
                default_task_queue_size()
            } else {
                self.task_queue_size
            },
            result_queue_size: if self.result_queue_size == 0 {
                default_result_queue_size()
            } else {
                self.result_queue_size
            },
        }
    }
}

fn default_lock_ttl_secs() -> u64 {
    30
}
fn default_sweep_interval_secs() -> u64 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_ttl_secs")]
    pub default_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_lock_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl LockConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_target_branch() -> String {
    "main".to_string()
}
fn default_merge_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_target_branch")]
    pub target_branch: String,
    #[serde(default)]
    pub strategy: MergeStrategy,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub cleanup_on_merge: bool,
    #[serde(default = "default_merge_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            target_branch: default_target_branch(),
            strategy: MergeStrategy::default(),
            dry_run: false,
            cleanup_on_merge: false,
            timeout_secs: default_merge_timeout_secs(),
        }
    }
}

impl MergeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_wave_timeout_secs() -> u64 {
    1800
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_wave_timeout_secs")]
    pub wave_timeout_secs: u64,
    #[serde(default)]
    pub auto_merge: bool,
    /// Whether a wave containing task failures aborts remaining waves
    /// instead of continuing with a recorded wave-level error.
    #[serde(default)]
    pub stop_on_wave_failure: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            wave_timeout_secs: default_wave_timeout_secs(),
            auto_merge: true,
            stop_on_wave_failure: false,
        }
    }
}

impl CoordinatorConfig {
    pub fn wave_timeout(&self) -> Duration {
        Duration::from_secs(self.wave_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_toml() {
        let cfg = PaccConfig::default();
        let text = toml::to_string(&cfg).expect("serialize");
        let parsed: PaccConfig = toml::from_str(&text).expect("parse");
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let parsed: PaccConfig = toml::from_str("[orchestrator]\nmax_agents = 8\n").unwrap();
        assert_eq!(parsed.orchestrator.max_agents, 8);
        assert_eq!(
            parsed.orchestrator.task_queue_size,
            default_task_queue_size()
        );
        assert_eq!(parsed.merge.target_branch, "main");
    }

    #[test]
    fn zero_orchestrator_values_normalize_to_defaults() {
        let cfg = OrchestratorConfig {
            max_agents: 0,
            task_queue_size: 0,
            result_queue_size: 0,
        };
        let normalized = cfg.normalized();
        assert_eq!(normalized.max_agents, default_max_agents());
        assert_eq!(normalized.task_queue_size, default_task_queue_size());
        assert_eq!(normalized.result_queue_size, default_result_queue_size());
    }
}
