//! Result assembly: canonical execution result and the API response shape.
//!
//! One consistent structure replaces per-path result dictionaries: the last
//! assistant message becomes the response, token accounting normalizes to
//! the prompt/completion spelling, and the status follows the errors list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capability::WorkflowType;
use crate::context::ExecutionContext;
use crate::events::ExecutionStatus;
use crate::message::Message;

/// Standardized execution result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub response: String,
    pub messages: Vec<Message>,

    pub execution_time_ms: u64,
    pub tokens_used: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: f64,

    pub tool_calls: u32,
    pub errors: Vec<String>,
    pub status: ExecutionStatus,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    pub execution_id: String,
    pub conversation_id: Option<String>,
    pub workflow_type: Option<WorkflowType>,
    pub definition_id: Option<String>,
    pub template_id: Option<String>,
    pub user_id: Option<String>,
}

/// API-shaped execution response, as transports serialize it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiExecutionResponse {
    pub id: String,
    pub owner_id: Option<String>,
    pub definition_id: Option<String>,
    pub status: ExecutionStatus,
    pub output_data: OutputData,
    pub execution_time_ms: u64,
    pub tokens_used: u64,
    pub cost: f64,
    pub error_message: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputData {
    pub response: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Builds the canonical result from a finished execution context.
pub fn assemble(
    ctx: &ExecutionContext,
    status: ExecutionStatus,
    execution_id: String,
    execution_time_ms: u64,
    workflow_type: Option<WorkflowType>,
    definition_id: Option<String>,
    template_id: Option<String>,
) -> ExecutionResult {
    let usage = ctx.usage_totals();
    let status = match status {
        // The errors list is authoritative for the completed/failed split.
        ExecutionStatus::Cancelled => ExecutionStatus::Cancelled,
        _ if ctx.errors.is_empty() => ExecutionStatus::Completed,
        _ => ExecutionStatus::Failed,
    };
    ExecutionResult {
        response: ctx.last_assistant_reply().unwrap_or_default().to_string(),
        messages: ctx.messages.clone(),
        execution_time_ms,
        tokens_used: usage.total_tokens as u64,
        prompt_tokens: usage.prompt_tokens as u64,
        completion_tokens: usage.completion_tokens as u64,
        cost: ctx.total_cost(),
        tool_calls: ctx.tool_call_count,
        errors: ctx.errors.clone(),
        status,
        metadata: ctx.metadata.clone(),
        execution_id,
        conversation_id: ctx.conversation_id.clone(),
        workflow_type,
        definition_id,
        template_id,
        user_id: Some(ctx.user_id.clone()),
    }
}

impl ExecutionResult {
    /// API response shape; `definition_id` falls back to the template id.
    pub fn to_api_response(&self) -> ApiExecutionResponse {
        ApiExecutionResponse {
            id: self.execution_id.clone(),
            owner_id: self.user_id.clone(),
            definition_id: self
                .definition_id
                .clone()
                .or_else(|| self.template_id.clone()),
            status: self.status,
            output_data: OutputData {
                response: self.response.clone(),
                metadata: self.metadata.clone(),
            },
            execution_time_ms: self.execution_time_ms,
            tokens_used: self.tokens_used,
            cost: self.cost,
            error_message: self.errors.first().cloned(),
        }
    }

    /// Payload for the `EXECUTION_COMPLETED` event.
    pub fn to_event_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("execution_id".into(), Value::from(self.execution_id.clone()));
        if let Some(ref conversation_id) = self.conversation_id {
            data.insert("conversation_id".into(), Value::from(conversation_id.clone()));
        }
        if let Some(workflow_type) = self.workflow_type {
            data.insert("workflow_type".into(), Value::from(workflow_type.as_str()));
        }
        data.insert("tokens_used".into(), Value::from(self.tokens_used));
        data.insert("cost".into(), Value::from(self.cost));
        data.insert(
            "execution_time_ms".into(),
            Value::from(self.execution_time_ms),
        );
        data.insert("tool_calls".into(), Value::from(self.tool_calls));
        data.insert("success".into(), Value::from(self.errors.is_empty()));
        data.insert("error_count".into(), Value::from(self.errors.len()));
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TokenUsage;

    fn finished_ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new("user-1", Some("conv-1".into()));
        ctx.messages.push(Message::user("hi"));
        ctx.messages.push(Message::assistant("hello there"));
        ctx.record_usage(&TokenUsage::new(10, 5), 0.002);
        ctx.tool_call_count = 2;
        ctx
    }

    /// **Scenario**: Assembly reads the last assistant reply, the normalized
    /// usage, and derives completed from the empty errors list.
    #[test]
    fn assemble_happy_path() {
        let result = assemble(
            &finished_ctx(),
            ExecutionStatus::Completed,
            "exec-1".into(),
            42,
            Some(WorkflowType::Plain),
            None,
            Some("tpl_1".into()),
        );
        assert_eq!(result.response, "hello there");
        assert_eq!(result.tokens_used, 15);
        assert_eq!(result.prompt_tokens, 10);
        assert_eq!(result.tool_calls, 2);
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert!((result.cost - 0.002).abs() < 1e-9);
    }

    /// **Scenario**: errors ⇔ status: a non-empty errors list forces failed;
    /// cancelled stays cancelled.
    #[test]
    fn status_follows_errors() {
        let mut ctx = finished_ctx();
        ctx.errors.push("boom".into());
        let result = assemble(
            &ctx,
            ExecutionStatus::Completed,
            "exec-1".into(),
            1,
            None,
            None,
            None,
        );
        assert_eq!(result.status, ExecutionStatus::Failed);

        let result = assemble(
            &ctx,
            ExecutionStatus::Cancelled,
            "exec-1".into(),
            1,
            None,
            None,
            None,
        );
        assert_eq!(result.status, ExecutionStatus::Cancelled);
    }

    /// **Scenario**: The API response uses the template id when no definition
    /// id is present, and surfaces the first error.
    #[test]
    fn api_response_shape() {
        let mut ctx = finished_ctx();
        ctx.errors.push("first".into());
        ctx.errors.push("second".into());
        let result = assemble(
            &ctx,
            ExecutionStatus::Failed,
            "exec-1".into(),
            9,
            None,
            None,
            Some("tpl_9".into()),
        );
        let api = result.to_api_response();
        assert_eq!(api.definition_id.as_deref(), Some("tpl_9"));
        assert_eq!(api.error_message.as_deref(), Some("first"));
        assert_eq!(api.output_data.response, "hello there");
        assert_eq!(api.owner_id.as_deref(), Some("user-1"));
    }

    /// **Scenario**: The result round-trips through the API shape preserving
    /// response, tokens, cost, and errors.
    #[test]
    fn round_trip_preserves_accounting() {
        let result = assemble(
            &finished_ctx(),
            ExecutionStatus::Completed,
            "exec-1".into(),
            5,
            Some(WorkflowType::Tools),
            None,
            None,
        );
        let api = result.to_api_response();
        let json = serde_json::to_string(&api).unwrap();
        let back: ApiExecutionResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.output_data.response, result.response);
        assert_eq!(back.tokens_used, result.tokens_used);
        assert_eq!(back.cost, result.cost);
        assert_eq!(back.error_message, None);
    }

    /// **Scenario**: Event data carries success and the accounting totals.
    #[test]
    fn event_data_projection() {
        let result = assemble(
            &finished_ctx(),
            ExecutionStatus::Completed,
            "exec-1".into(),
            5,
            Some(WorkflowType::Plain),
            None,
            None,
        );
        let data = result.to_event_data();
        assert_eq!(data["success"], Value::from(true));
        assert_eq!(data["tokens_used"], Value::from(15));
        assert_eq!(data["tool_calls"], Value::from(2));
    }
}
