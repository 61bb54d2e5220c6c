//! Model node executor: builds the effective message list, invokes the
//! provider, and accounts for tokens.
//!
//! Serves both the `model` and `llm` spellings; `llm` config keys win when
//! both are present.

use workflow_event::EventType;

use crate::context::ExecutionContext;
use crate::error::WorkflowError;
use crate::graph::NodeSpec;
use crate::llm::CompletionRequest;
use crate::message::Message;
use crate::nodes::{NodeServices, NodeStep};

pub(super) async fn execute(
    spec: &NodeSpec,
    mut ctx: ExecutionContext,
    services: &NodeServices,
) -> Result<(ExecutionContext, NodeStep), WorkflowError> {
    let request = build_request(spec, &ctx, services);

    let response = tokio::select! {
        _ = services.cancel.cancelled() => return Err(WorkflowError::Cancelled),
        result = services.model.complete(&request) => result?,
    };

    ctx.has_tool_calls = !response.tool_calls.is_empty();
    ctx.messages.push(Message::assistant_with_tools(
        response.content,
        response.tool_calls,
        response.usage.clone(),
    ));

    if let Some(ref usage) = response.usage {
        let cost = response.cost.unwrap_or(0.0);
        let (totals, running_cost) = ctx.record_usage(usage, cost);
        services
            .bus
            .publish(
                services
                    .event(&ctx, EventType::TokenUsage)
                    .with("node_id", spec.id.clone())
                    .with("prompt_tokens", usage.prompt_tokens)
                    .with("completion_tokens", usage.completion_tokens)
                    .with("delta_tokens", usage.total_tokens)
                    .with("tokens_used", totals.total_tokens)
                    .with("cost", running_cost),
            )
            .await;
    }

    Ok((ctx, NodeStep::Continue))
}

/// Effective message list: optional system message, the rolling summary, the
/// retrieval context as an extra system message, then the conversation.
fn build_request(
    spec: &NodeSpec,
    ctx: &ExecutionContext,
    services: &NodeServices,
) -> CompletionRequest {
    let mut messages = Vec::with_capacity(ctx.messages.len() + 3);
    let system = spec
        .config_str("system_prompt")
        .or_else(|| spec.config_str("system_message"));
    if let Some(system) = system {
        if !system.is_empty() {
            messages.push(Message::system(system));
        }
    }
    if let Some(ref summary) = ctx.conversation_summary {
        if !summary.is_empty() {
            messages.push(Message::system(format!(
                "Summary of the earlier conversation:\n{summary}"
            )));
        }
    }
    if let Some(ref context) = ctx.retrieval_context {
        if !context.is_empty() {
            messages.push(Message::system(format!(
                "Use the following context to answer:\n\n{context}"
            )));
        }
    }
    messages.extend(ctx.messages.iter().cloned());

    let tools_enabled = spec
        .config_bool("enable_tools")
        .unwrap_or(services.capabilities.enable_tools);
    let tools = match (&services.tools, tools_enabled) {
        (Some(registry), true) => registry.list_tools(),
        _ => vec![],
    };

    CompletionRequest {
        messages,
        provider: spec.config_str("provider").unwrap_or("openai").to_string(),
        model: spec.config_str("model").unwrap_or("gpt-4").to_string(),
        temperature: spec.config_f64("temperature").unwrap_or(0.7),
        max_tokens: spec.config_u64("max_tokens").unwrap_or(1000) as u32,
        tools,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockModel;
    use crate::message::TokenUsage;
    use crate::nodes::test_support::services;
    use crate::registry::NodeKind;
    use serde_json::Value;
    use std::sync::Arc;

    fn llm_spec() -> NodeSpec {
        let mut spec = NodeSpec::new("llm", NodeKind::Llm);
        spec.config.insert("model".into(), Value::from("m1"));
        spec.config
            .insert("system_prompt".into(), Value::from("Be helpful."));
        spec
    }

    /// **Scenario**: The provider sees system + retrieval context + history,
    /// and the reply lands as the last assistant message.
    #[tokio::test]
    async fn effective_message_list() {
        let mock = Arc::new(MockModel::with_reply("Python is popular."));
        let services = services(mock.clone());
        let mut ctx = ExecutionContext::new("user-1", None);
        ctx.retrieval_context = Some("Python is a high-level language.".into());
        ctx.messages.push(Message::user("What is Python?"));

        let (ctx, step) = execute(&llm_spec(), ctx, &services).await.unwrap();
        assert_eq!(step, NodeStep::Continue);
        assert_eq!(ctx.last_assistant_reply(), Some("Python is popular."));

        let seen = mock.seen_requests();
        assert_eq!(seen[0].model, "m1");
        let roles: Vec<_> = seen[0].messages.iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec!["system", "system", "user"]);
        assert!(seen[0].messages[1]
            .content()
            .contains("Python is a high-level language."));
    }

    /// **Scenario**: Tool-call replies set the synthetic has_tool_calls flag;
    /// plain replies clear it.
    #[tokio::test]
    async fn has_tool_calls_flag() {
        let mock = Arc::new(MockModel::one_tool_round("get_time", "done"));
        let services = services(mock);
        let ctx = ExecutionContext::new("user-1", None);
        let (ctx, _) = execute(&llm_spec(), ctx, &services).await.unwrap();
        assert!(ctx.has_tool_calls);
        let (ctx, _) = execute(&llm_spec(), ctx, &services).await.unwrap();
        assert!(!ctx.has_tool_calls);
    }

    /// **Scenario**: Token usage accumulates into metadata across calls.
    #[tokio::test]
    async fn usage_recorded() {
        let services = services(Arc::new(MockModel::with_reply("hi")));
        let ctx = ExecutionContext::new("user-1", None);
        let (ctx, _) = execute(&llm_spec(), ctx, &services).await.unwrap();
        let (ctx, _) = execute(&llm_spec(), ctx, &services).await.unwrap();
        assert_eq!(ctx.usage_totals(), TokenUsage::new(24, 16));
        assert!(ctx.total_cost() > 0.0);
    }

    /// **Scenario**: The `model` spelling with `system_message` produces the
    /// same effective system prompt.
    #[tokio::test]
    async fn model_spelling_system_message() {
        let mock = Arc::new(MockModel::with_reply("ok"));
        let services = services(mock.clone());
        let mut spec = NodeSpec::new("m", NodeKind::Model);
        spec.config.insert("model".into(), Value::from("m1"));
        spec.config
            .insert("system_message".into(), Value::from("Legacy prompt"));
        let mut ctx = ExecutionContext::new("user-1", None);
        ctx.messages.push(Message::user("hi"));
        execute(&spec, ctx, &services).await.unwrap();
        let seen = mock.seen_requests();
        assert_eq!(seen[0].messages[0].content(), "Legacy prompt");
    }
}
