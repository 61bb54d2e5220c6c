//! Tools node executor: runs the tool calls requested by the last model
//! turn.
//!
//! Serves both the `tool` and `tools` spellings. Each call gets a per-call
//! timeout and a `TOOL_CALLED` event; the capability's `max_tool_calls` is a
//! hard ceiling across the whole execution.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::warn;
use workflow_event::EventType;

use crate::context::ExecutionContext;
use crate::error::WorkflowError;
use crate::graph::NodeSpec;
use crate::message::{Message, ToolCall};
use crate::nodes::{NodeServices, NodeStep};
use crate::tools::{ToolError, ToolRegistry};

const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;

pub(super) async fn execute(
    spec: &NodeSpec,
    mut ctx: ExecutionContext,
    services: &NodeServices,
) -> Result<(ExecutionContext, NodeStep), WorkflowError> {
    let cap = services.capabilities.max_tool_calls;
    if cap == 0 {
        return Err(WorkflowError::ResourceLimitExceeded {
            resource: "max_tool_calls".into(),
            limit: 0,
        });
    }
    let registry = services
        .tools
        .as_ref()
        .ok_or_else(|| WorkflowError::Runtime("no tool registry available".into()))?;

    let calls: Vec<ToolCall> = ctx.pending_tool_calls().to_vec();
    if calls.is_empty() {
        return Ok((ctx, NodeStep::Continue));
    }

    let remaining = cap.saturating_sub(ctx.tool_call_count);
    if calls.len() as u32 > remaining {
        return Err(WorkflowError::ResourceLimitExceeded {
            resource: "max_tool_calls".into(),
            limit: cap as u64,
        });
    }

    let timeout = Duration::from_millis(
        spec.config_u64("tool_timeout_ms")
            .unwrap_or(DEFAULT_TOOL_TIMEOUT_MS),
    );
    let parallel = spec.config_bool("parallel_calls").unwrap_or(false);

    let outcomes: Vec<(ToolCall, Result<String, ToolError>, u64)> = if parallel {
        let pending: Vec<_> = calls
            .iter()
            .map(|call| run_one(registry.as_ref(), call, timeout, services))
            .collect();
        let results = futures::future::join_all(pending).await;
        calls.into_iter().zip(results).map(|(c, (r, ms))| (c, r, ms)).collect()
    } else {
        let mut out = Vec::with_capacity(calls.len());
        for call in calls {
            let (result, ms) = run_one(registry.as_ref(), &call, timeout, services).await;
            out.push((call, result, ms));
        }
        out
    };

    for (call, result, duration_ms) in outcomes {
        let call_id = call.id.clone().unwrap_or_else(|| call.name.clone());
        ctx.tool_call_count += 1;
        services
            .bus
            .publish(
                services
                    .event(&ctx, EventType::ToolCalled)
                    .with("node_id", spec.id.clone())
                    .with("tool_name", call.name.clone())
                    .with("tool_call_id", call_id.clone())
                    .with("duration_ms", duration_ms)
                    .with("success", result.is_ok()),
            )
            .await;
        match result {
            Ok(text) => ctx.messages.push(Message::tool(call_id, text)),
            Err(e) => {
                let bypass = registry
                    .tool(&call.name)
                    .map(|spec| spec.bypass_when_unavailable)
                    .unwrap_or(false);
                if bypass {
                    warn!(tool = %call.name, error = %e, "tool failed, bypassing");
                    ctx.messages
                        .push(Message::tool(call_id, format!("Error: {e}")));
                } else {
                    return Err(e.into());
                }
            }
        }
    }

    Ok((ctx, NodeStep::Continue))
}

/// One call with timeout and cancellation; returns the result and its
/// duration.
async fn run_one(
    registry: &dyn ToolRegistry,
    call: &ToolCall,
    timeout: Duration,
    services: &NodeServices,
) -> (Result<String, ToolError>, u64) {
    let arguments: Value =
        serde_json::from_str(&call.arguments).unwrap_or_else(|_| Value::Object(Default::default()));
    let started = Instant::now();
    let result = tokio::select! {
        _ = services.cancel.cancelled() => {
            Err(ToolError::Execution("cancelled".into()))
        }
        timed = tokio::time::timeout(timeout, registry.call_tool(&call.name, &arguments)) => {
            match timed {
                Ok(result) => result.map(|output| output.text),
                Err(_) => Err(ToolError::Execution(format!(
                    "{} timed out after {}ms",
                    call.name,
                    timeout.as_millis()
                ))),
            }
        }
    };
    (result, started.elapsed().as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockModel;
    use crate::nodes::test_support::services;
    use crate::registry::NodeKind;
    use crate::tools::MockToolRegistry;
    use std::sync::Arc;

    fn ctx_with_calls(names: &[&str]) -> ExecutionContext {
        let mut ctx = ExecutionContext::new("user-1", None);
        let calls = names
            .iter()
            .enumerate()
            .map(|(i, name)| ToolCall {
                name: (*name).to_string(),
                arguments: "{}".into(),
                id: Some(format!("call-{i}")),
            })
            .collect();
        ctx.messages
            .push(Message::assistant_with_tools("", calls, None));
        ctx
    }

    fn tool_services(registry: MockToolRegistry) -> super::super::NodeServices {
        let mut services = services(Arc::new(MockModel::with_reply("ok")));
        services.tools = Some(Arc::new(registry));
        services.capabilities.enable_tools = true;
        services
    }

    /// **Scenario**: Each pending call produces a tool message and bumps the
    /// counter.
    #[tokio::test]
    async fn executes_pending_calls() {
        let services = tool_services(MockToolRegistry::new().with_tool("get_time", "12:00"));
        let ctx = ctx_with_calls(&["get_time"]);
        let spec = NodeSpec::new("tools", NodeKind::Tools);
        let (ctx, step) = execute(&spec, ctx, &services).await.unwrap();
        assert_eq!(step, NodeStep::Continue);
        assert_eq!(ctx.tool_call_count, 1);
        match ctx.messages.last().unwrap() {
            Message::Tool {
                tool_call_id,
                content,
            } => {
                assert_eq!(tool_call_id, "call-0");
                assert_eq!(content, "12:00");
            }
            other => panic!("expected tool message, got {other:?}"),
        }
    }

    /// **Scenario**: A zero tool budget fails with ResourceLimitExceeded even
    /// before looking at pending calls.
    #[tokio::test]
    async fn zero_budget_fails() {
        let mut services = tool_services(MockToolRegistry::new().with_tool("t", "r"));
        services.capabilities.max_tool_calls = 0;
        let ctx = ctx_with_calls(&[]);
        let spec = NodeSpec::new("tools", NodeKind::Tools);
        let err = execute(&spec, ctx, &services).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ResourceLimitExceeded { limit: 0, .. }
        ));
    }

    /// **Scenario**: Exceeding the remaining budget fails; the limit rides in
    /// the error.
    #[tokio::test]
    async fn budget_exhaustion() {
        let mut services = tool_services(MockToolRegistry::new().with_tool("t", "r"));
        services.capabilities.max_tool_calls = 2;
        let mut ctx = ctx_with_calls(&["t"]);
        ctx.tool_call_count = 2;
        let spec = NodeSpec::new("tools", NodeKind::Tools);
        let err = execute(&spec, ctx, &services).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ResourceLimitExceeded { limit: 2, .. }
        ));
    }

    /// **Scenario**: A failing tool with bypass degrades to a synthetic
    /// error message; without bypass the node fails.
    #[tokio::test]
    async fn bypass_semantics() {
        let services = tool_services(MockToolRegistry::new().with_failing_tool("flaky", true));
        let ctx = ctx_with_calls(&["flaky"]);
        let spec = NodeSpec::new("tools", NodeKind::Tools);
        let (ctx, _) = execute(&spec, ctx, &services).await.unwrap();
        assert!(ctx.messages.last().unwrap().content().starts_with("Error:"));

        let services = tool_services(MockToolRegistry::new().with_failing_tool("fatal", false));
        let ctx = ctx_with_calls(&["fatal"]);
        let err = execute(&spec, ctx, &services).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Tool(_)));
    }

    /// **Scenario**: parallel_calls executes every pending call and keeps one
    /// TOOL message per call.
    #[tokio::test]
    async fn parallel_calls() {
        let services = tool_services(
            MockToolRegistry::new()
                .with_tool("a", "ra")
                .with_tool("b", "rb"),
        );
        let mut spec = NodeSpec::new("tools", NodeKind::Tools);
        spec.config
            .insert("parallel_calls".into(), Value::from(true));
        let ctx = ctx_with_calls(&["a", "b"]);
        let (ctx, _) = execute(&spec, ctx, &services).await.unwrap();
        assert_eq!(ctx.tool_call_count, 2);
        let tool_messages = ctx
            .messages
            .iter()
            .filter(|m| m.role() == "tool")
            .count();
        assert_eq!(tool_messages, 2);
    }
}
