//! Engine tunables, loadable from the environment.
//!
//! `from_env` first lets the workspace config crate fill the environment
//! from the project `.env` and the user's XDG `config.toml` (existing env
//! always wins), then reads the typed `WEFT_*` variables.

use std::sync::Once;
use std::time::Duration;

use tracing::warn;

use crate::validation::ValidationLimits;

/// Engine-wide settings with their defaults.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Maximum nodes per graph.
    pub max_nodes: u32,
    /// Edge ceiling as a multiple of node count.
    pub max_edges_per_node: u32,
    /// Hard cap on loop `max_iterations`.
    pub max_loop_iterations: u32,
    /// Per-execution budget for the sum of model-node `max_tokens`.
    pub token_budget: u64,
    /// Per-node execution deadline.
    pub node_timeout: Duration,
    /// Whole-execution deadline.
    pub execution_timeout: Duration,
    /// Cap on per-execution debug log entries.
    pub max_log_entries: usize,
    /// Worker multiplier for sizing an upstream pool (advisory; the engine
    /// itself runs one cooperative task per execution).
    pub worker_multiplier: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_nodes: 500,
            max_edges_per_node: 4,
            max_loop_iterations: 1000,
            token_budget: 100_000,
            node_timeout: Duration::from_secs(60),
            execution_timeout: Duration::from_secs(120),
            max_log_entries: 1000,
            worker_multiplier: 4,
        }
    }
}

impl EngineSettings {
    /// Reads settings from `WEFT_*` environment variables, falling back to
    /// the defaults. On first use this applies the project `.env` and XDG
    /// `config.toml` to the environment; variables the operator already set
    /// are never overwritten.
    pub fn from_env() -> Self {
        static APPLY: Once = Once::new();
        APPLY.call_once(|| {
            if let Err(e) = env_config::load_and_apply("weft", None) {
                warn!(error = %e, "config load failed; using environment and defaults");
            }
        });
        let defaults = Self::default();
        Self {
            max_nodes: env_config::env_u32("WEFT_MAX_NODES", defaults.max_nodes),
            max_edges_per_node: env_config::env_u32(
                "WEFT_MAX_EDGES_PER_NODE",
                defaults.max_edges_per_node,
            ),
            max_loop_iterations: env_config::env_u32(
                "WEFT_MAX_LOOP_ITERATIONS",
                defaults.max_loop_iterations,
            ),
            token_budget: env_config::env_u64("WEFT_TOKEN_BUDGET", defaults.token_budget),
            node_timeout: Duration::from_millis(env_config::env_u64(
                "WEFT_NODE_TIMEOUT_MS",
                defaults.node_timeout.as_millis() as u64,
            )),
            execution_timeout: Duration::from_millis(env_config::env_u64(
                "WEFT_EXECUTION_TIMEOUT_MS",
                defaults.execution_timeout.as_millis() as u64,
            )),
            max_log_entries: env_config::env_u64(
                "WEFT_MAX_LOG_ENTRIES",
                defaults.max_log_entries as u64,
            ) as usize,
            worker_multiplier: env_config::env_u64(
                "WEFT_WORKER_MULTIPLIER",
                defaults.worker_multiplier as u64,
            ) as usize,
        }
    }

    /// Suggested worker-pool size for the hosting process.
    pub fn suggested_workers(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        cores * self.worker_multiplier
    }

    /// The slice of settings the validator consumes.
    pub fn validation_limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_nodes: self.max_nodes,
            max_edges_per_node: self.max_edges_per_node,
            max_loop_iterations: self.max_loop_iterations,
            token_budget: self.token_budget,
        }
    }
}
