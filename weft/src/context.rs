//! Execution context: the state threaded through node executors.
//!
//! One context per execution, owned by the execution task. Executors follow
//! a state-in, state-out discipline: each receives the context by value and
//! returns the mutated context, so there is exactly one writer at any time.
//! The context is destroyed after the result assembler reads it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition::ConditionScope;
use crate::message::{Message, TokenUsage};

/// Per-loop-node iteration state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoopState {
    pub iteration: u32,
    pub started_at: DateTime<Utc>,
}

/// Per-error-handler retry state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorState {
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// One entry of the execution history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub node_id: String,
    pub entered_at: DateTime<Utc>,
    pub exited_at: DateTime<Utc>,
    /// `ok`, `error`, or a branch note.
    pub outcome: String,
}

/// State threaded through node executors for one execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub messages: Vec<Message>,
    pub user_id: String,
    pub conversation_id: Option<String>,
    /// Joined page contents from the last retrieval, if any.
    pub retrieval_context: Option<String>,
    /// Rolling summary maintained by the memory node.
    pub conversation_summary: Option<String>,
    pub tool_call_count: u32,
    pub variables: Map<String, Value>,
    pub loop_state: HashMap<String, LoopState>,
    pub error_state: HashMap<String, ErrorState>,
    pub conditional_results: HashMap<String, bool>,
    pub execution_history: Vec<HistoryEntry>,
    pub metadata: Map<String, Value>,
    /// Fatal errors recorded on the way to the nearest end node.
    pub errors: Vec<String>,
    /// Synthetic flag: the last model reply requested tool calls.
    pub has_tool_calls: bool,
}

impl ExecutionContext {
    pub fn new(user_id: impl Into<String>, conversation_id: Option<String>) -> Self {
        Self {
            messages: Vec::new(),
            user_id: user_id.into(),
            conversation_id,
            retrieval_context: None,
            conversation_summary: None,
            tool_call_count: 0,
            variables: Map::new(),
            loop_state: HashMap::new(),
            error_state: HashMap::new(),
            conditional_results: HashMap::new(),
            execution_history: Vec::new(),
            metadata: Map::new(),
            errors: Vec::new(),
            has_tool_calls: false,
        }
    }

    /// Content of the chronologically last user message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(Message::content)
    }

    /// Content of the chronologically last assistant message, if any. Empty
    /// content (a tool-call-only turn) returns `Some("")`.
    pub fn last_assistant_reply(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_assistant())
            .map(Message::content)
    }

    /// The last assistant message's pending tool calls.
    pub fn pending_tool_calls(&self) -> &[crate::message::ToolCall] {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_assistant())
            .map(Message::tool_calls)
            .unwrap_or(&[])
    }

    /// Accumulates token usage and cost into `metadata.usage_metadata` /
    /// `metadata.cost`, returning the new running totals.
    pub fn record_usage(&mut self, usage: &TokenUsage, cost: f64) -> (TokenUsage, f64) {
        let mut totals = self.usage_totals();
        totals.accumulate(usage);
        self.metadata.insert(
            "usage_metadata".into(),
            serde_json::json!({
                "prompt_tokens": totals.prompt_tokens,
                "completion_tokens": totals.completion_tokens,
                "total_tokens": totals.total_tokens,
            }),
        );
        let running_cost = self.total_cost() + cost;
        self.metadata.insert("cost".into(), Value::from(running_cost));
        (totals, running_cost)
    }

    /// Running token totals from `metadata.usage_metadata`, accepting both
    /// the `prompt_tokens`/`completion_tokens` and `input_tokens`/
    /// `output_tokens` spellings.
    pub fn usage_totals(&self) -> TokenUsage {
        let Some(usage) = self.metadata.get("usage_metadata") else {
            return TokenUsage::default();
        };
        let read = |keys: [&str; 2]| {
            keys.iter()
                .find_map(|k| usage.get(*k).and_then(Value::as_u64))
                .unwrap_or(0) as u32
        };
        let prompt = read(["prompt_tokens", "input_tokens"]);
        let completion = read(["completion_tokens", "output_tokens"]);
        let total = usage
            .get("total_tokens")
            .and_then(Value::as_u64)
            .map(|t| t as u32)
            .unwrap_or(prompt + completion);
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total,
        }
    }

    /// Running cost from `metadata.cost`.
    pub fn total_cost(&self) -> f64 {
        self.metadata
            .get("cost")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }

    /// Read-only view for condition evaluation.
    pub fn condition_scope(&self) -> ConditionScope<'_> {
        ConditionScope {
            variables: &self.variables,
            tool_call_count: self.tool_call_count,
            has_tool_calls: self.has_tool_calls,
        }
    }

    /// Appends one history entry.
    pub fn record_history(
        &mut self,
        node_id: impl Into<String>,
        entered_at: DateTime<Utc>,
        outcome: impl Into<String>,
    ) {
        self.execution_history.push(HistoryEntry {
            node_id: node_id.into(),
            entered_at,
            exited_at: Utc::now(),
            outcome: outcome.into(),
        });
    }

    /// Number of prior executions of one node in this run.
    pub fn visits(&self, node_id: &str) -> u32 {
        self.execution_history
            .iter()
            .filter(|entry| entry.node_id == node_id)
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;

    /// **Scenario**: Last-message accessors scan from the tail and skip other
    /// roles.
    #[test]
    fn last_message_accessors() {
        let mut ctx = ExecutionContext::new("user-1", None);
        assert!(ctx.last_user_message().is_none());
        ctx.messages.push(Message::user("first"));
        ctx.messages.push(Message::assistant("reply"));
        ctx.messages.push(Message::user("second"));
        assert_eq!(ctx.last_user_message(), Some("second"));
        assert_eq!(ctx.last_assistant_reply(), Some("reply"));
    }

    /// **Scenario**: Pending tool calls come from the last assistant turn.
    #[test]
    fn pending_tool_calls_from_last_assistant() {
        let mut ctx = ExecutionContext::new("user-1", None);
        ctx.messages.push(Message::assistant_with_tools(
            "",
            vec![ToolCall {
                name: "get_time".into(),
                arguments: "{}".into(),
                id: Some("c1".into()),
            }],
            None,
        ));
        ctx.messages.push(Message::tool("c1", "12:00"));
        assert_eq!(ctx.pending_tool_calls().len(), 1);
    }

    /// **Scenario**: Usage accumulates across calls and normalizes through
    /// metadata; the input/output spelling is also accepted on read.
    #[test]
    fn usage_accumulation_and_spellings() {
        let mut ctx = ExecutionContext::new("user-1", None);
        ctx.record_usage(&TokenUsage::new(10, 5), 0.001);
        let (totals, cost) = ctx.record_usage(&TokenUsage::new(20, 10), 0.002);
        assert_eq!(totals.total_tokens, 45);
        assert!((cost - 0.003).abs() < 1e-9);

        // A collaborator may write the other spelling; reads normalize it.
        ctx.metadata.insert(
            "usage_metadata".into(),
            serde_json::json!({"input_tokens": 7, "output_tokens": 3}),
        );
        let totals = ctx.usage_totals();
        assert_eq!(totals.prompt_tokens, 7);
        assert_eq!(totals.total_tokens, 10);
    }

    /// **Scenario**: visits counts history entries for one node id.
    #[test]
    fn visits_counts_history() {
        let mut ctx = ExecutionContext::new("user-1", None);
        let now = Utc::now();
        ctx.record_history("delay", now, "ok");
        ctx.record_history("llm", now, "ok");
        ctx.record_history("delay", now, "ok");
        assert_eq!(ctx.visits("delay"), 2);
        assert_eq!(ctx.visits("missing"), 0);
    }
}
