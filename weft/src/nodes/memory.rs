//! Memory node executor: rolling summary over messages older than the
//! window.
//!
//! Uses the model provider to summarize, folds the previous summary into the
//! new one, and truncates the message list to the tail window. A window of 0
//! leaves the context untouched.

use workflow_event::EventType;

use crate::context::ExecutionContext;
use crate::error::WorkflowError;
use crate::graph::NodeSpec;
use crate::llm::CompletionRequest;
use crate::message::Message;
use crate::nodes::{NodeServices, NodeStep};

const SUMMARY_MAX_TOKENS: u32 = 256;

pub(super) async fn execute(
    spec: &NodeSpec,
    mut ctx: ExecutionContext,
    services: &NodeServices,
) -> Result<(ExecutionContext, NodeStep), WorkflowError> {
    let window = spec
        .config_u64("memory_window")
        .unwrap_or(services.capabilities.memory_window as u64) as usize;
    if window == 0 || ctx.messages.len() <= window {
        return Ok((ctx, NodeStep::Continue));
    }

    let split = ctx.messages.len() - window;
    let older: Vec<Message> = ctx.messages.drain(..split).collect();

    let mut transcript = String::new();
    if let Some(ref summary) = ctx.conversation_summary {
        transcript.push_str("Earlier summary:\n");
        transcript.push_str(summary);
        transcript.push_str("\n\n");
    }
    for message in &older {
        transcript.push_str(message.role());
        transcript.push_str(": ");
        transcript.push_str(message.content());
        transcript.push('\n');
    }

    let request = CompletionRequest {
        messages: vec![
            Message::system(
                "Summarize the conversation below in a few sentences, keeping facts, \
                 names, and open questions.",
            ),
            Message::user(transcript),
        ],
        provider: "openai".into(),
        model: spec.config_str("model").unwrap_or("gpt-4").to_string(),
        temperature: 0.0,
        max_tokens: SUMMARY_MAX_TOKENS,
        tools: vec![],
    };

    let response = tokio::select! {
        _ = services.cancel.cancelled() => return Err(WorkflowError::Cancelled),
        result = services.model.complete(&request) => result?,
    };

    if let Some(ref usage) = response.usage {
        let cost = response.cost.unwrap_or(0.0);
        let (totals, running_cost) = ctx.record_usage(usage, cost);
        services
            .bus
            .publish(
                services
                    .event(&ctx, EventType::TokenUsage)
                    .with("node_id", spec.id.clone())
                    .with("delta_tokens", usage.total_tokens)
                    .with("tokens_used", totals.total_tokens)
                    .with("cost", running_cost),
            )
            .await;
    }

    ctx.conversation_summary = Some(response.content);
    Ok((ctx, NodeStep::Continue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockModel;
    use crate::nodes::test_support::services;
    use crate::registry::NodeKind;
    use serde_json::Value;
    use std::sync::Arc;

    fn chat(len: usize) -> ExecutionContext {
        let mut ctx = ExecutionContext::new("user-1", None);
        for i in 0..len {
            ctx.messages.push(Message::user(format!("message {i}")));
        }
        ctx
    }

    fn spec_with_window(window: u64) -> NodeSpec {
        let mut spec = NodeSpec::new("memory", NodeKind::Memory);
        spec.config
            .insert("memory_window".into(), Value::from(window));
        spec
    }

    /// **Scenario**: Messages above the window are summarized away; the tail
    /// window survives verbatim.
    #[tokio::test]
    async fn summarizes_and_truncates() {
        let mock = Arc::new(MockModel::with_reply("They talked about five things."));
        let services = services(mock.clone());
        let ctx = chat(5);
        let (ctx, _) = execute(&spec_with_window(2), ctx, &services)
            .await
            .unwrap();
        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.messages[0].content(), "message 3");
        assert_eq!(
            ctx.conversation_summary.as_deref(),
            Some("They talked about five things.")
        );
        // The summarizer saw the older messages, not the tail.
        let seen = mock.seen_requests();
        assert!(seen[0].messages[1].content().contains("message 0"));
        assert!(!seen[0].messages[1].content().contains("message 4"));
    }

    /// **Scenario**: A window of 0 leaves messages untouched and the summary
    /// unset.
    #[tokio::test]
    async fn zero_window_is_noop() {
        let mock = Arc::new(MockModel::with_reply("unused"));
        let services = services(mock.clone());
        let ctx = chat(5);
        let (ctx, _) = execute(&spec_with_window(0), ctx, &services)
            .await
            .unwrap();
        assert_eq!(ctx.messages.len(), 5);
        assert!(ctx.conversation_summary.is_none());
        assert_eq!(mock.call_count(), 0);
    }

    /// **Scenario**: The previous summary folds into the next summarization
    /// prompt.
    #[tokio::test]
    async fn rolling_summary_folds_previous() {
        let mock = Arc::new(MockModel::with_reply("updated summary"));
        let services = services(mock.clone());
        let mut ctx = chat(4);
        ctx.conversation_summary = Some("old summary".into());
        let (ctx, _) = execute(&spec_with_window(1), ctx, &services)
            .await
            .unwrap();
        assert_eq!(ctx.conversation_summary.as_deref(), Some("updated summary"));
        let seen = mock.seen_requests();
        assert!(seen[0].messages[1].content().contains("old summary"));
    }

    /// **Scenario**: Fewer messages than the window is a no-op.
    #[tokio::test]
    async fn under_window_is_noop() {
        let mock = Arc::new(MockModel::with_reply("unused"));
        let services = services(mock.clone());
        let ctx = chat(2);
        let (ctx, _) = execute(&spec_with_window(10), ctx, &services)
            .await
            .unwrap();
        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(mock.call_count(), 0);
    }
}
