//! Delay node executor: fixed, random, exponential, or variable-driven
//! pauses.
//!
//! The sleep is cancellable; cancellation mid-delay aborts promptly with the
//! cancelled error. Exponential backoff doubles per prior visit of this node
//! in the execution history (retry loops revisit the node), capped at
//! `max_duration`.

use std::time::Duration;

use rand::Rng;

use crate::context::ExecutionContext;
use crate::error::WorkflowError;
use crate::graph::NodeSpec;
use crate::nodes::{NodeServices, NodeStep};

pub(super) async fn execute(
    spec: &NodeSpec,
    ctx: ExecutionContext,
    services: &NodeServices,
) -> Result<(ExecutionContext, NodeStep), WorkflowError> {
    let duration = spec.config_u64("duration").ok_or_else(|| {
        WorkflowError::Runtime(format!("delay node {} has no duration", spec.id))
    })?;
    let max_duration = spec.config_u64("max_duration");
    let delay_type = spec.config_str("delay_type").unwrap_or("fixed");

    let millis = match delay_type {
        "fixed" => duration,
        "random" => {
            let upper = max_duration.unwrap_or(duration).max(duration);
            rand::thread_rng().gen_range(duration..=upper)
        }
        "exponential" => {
            let attempt = ctx.visits(&spec.id).min(16);
            let backoff = duration.saturating_mul(1u64 << attempt);
            max_duration.map_or(backoff, |cap| backoff.min(cap))
        }
        "dynamic" => {
            let from_variable = spec
                .config_str("duration_variable")
                .and_then(|name| ctx.variables.get(name))
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(duration);
            max_duration.map_or(from_variable, |cap| from_variable.min(cap))
        }
        other => {
            return Err(WorkflowError::Runtime(format!(
                "delay node {} has unknown delay_type: {other}",
                spec.id
            )))
        }
    };

    tokio::select! {
        _ = services.cancel.cancelled() => Err(WorkflowError::Cancelled),
        _ = tokio::time::sleep(Duration::from_millis(millis)) => Ok((ctx, NodeStep::Continue)),
    }
}
