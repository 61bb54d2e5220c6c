//! Message types for execution state.
//!
//! Message roles: System (usually first in the list), User, Assistant, Tool.
//! Used by `ExecutionContext::messages` and by node executors that read and
//! append messages. Assistant messages carry the tool calls requested by the
//! model and the token usage of the call that produced them; Tool messages
//! carry the result of one tool invocation correlated by `call_id`.

use serde::{Deserialize, Serialize};

/// Token usage for one model call (prompt + completion).
///
/// **Interaction**: Optional part of [`crate::llm::ModelResponse`]; accumulated
/// into `ExecutionContext::metadata` and emitted as `TOKEN_USAGE` events.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt (input).
    pub prompt_tokens: u32,
    /// Tokens in the completion (output).
    pub completion_tokens: u32,
    /// Total tokens (prompt + completion).
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Creates usage from prompt and completion counts; total is their sum.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Adds another usage into this one, field by field.
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A single tool invocation requested by the model.
///
/// `arguments` is a JSON string; the tools executor parses it when calling the
/// registry. Optional `id` correlates the eventual Tool message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name as registered in the tool registry.
    pub name: String,
    /// Arguments as a JSON string.
    pub arguments: String,
    /// Optional id to match with the Tool message carrying the result.
    pub id: Option<String>,
}

/// A single message in the conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// System prompt; typically placed first in the message list.
    System { content: String },
    /// User input.
    User { content: String },
    /// Model reply, possibly requesting tool calls.
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_usage: Option<TokenUsage>,
    },
    /// Result of one tool invocation, correlated by `tool_call_id`.
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Message {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Creates an assistant message without tool calls or usage.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: vec![],
            token_usage: None,
        }
    }

    /// Creates an assistant message with tool calls and usage.
    pub fn assistant_with_tools(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        token_usage: Option<TokenUsage>,
    ) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
            token_usage,
        }
    }

    /// Creates a tool-result message.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// Message content regardless of role.
    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    /// Role name as it appears on the wire.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    /// Tool calls requested by this message (empty for non-assistant roles).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Message::Assistant { .. })
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Message::User { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Constructors produce the correct role and content.
    #[test]
    fn message_constructors() {
        assert_eq!(Message::system("s").role(), "system");
        assert_eq!(Message::user("u").content(), "u");
        let tool = Message::tool("call-1", "ok");
        assert_eq!(tool.role(), "tool");
        assert_eq!(tool.content(), "ok");
    }

    /// **Scenario**: Assistant messages expose their tool calls; other roles
    /// expose an empty slice.
    #[test]
    fn tool_calls_accessor() {
        let call = ToolCall {
            name: "get_time".into(),
            arguments: "{}".into(),
            id: Some("call-1".into()),
        };
        let msg = Message::assistant_with_tools("", vec![call], None);
        assert_eq!(msg.tool_calls().len(), 1);
        assert!(Message::user("hi").tool_calls().is_empty());
    }

    /// **Scenario**: Messages round-trip through serde with a `role` tag.
    #[test]
    fn message_serde_roundtrip() {
        let msg = Message::assistant_with_tools(
            "reply",
            vec![ToolCall {
                name: "calc".into(),
                arguments: "{\"a\":1}".into(),
                id: Some("c1".into()),
            }],
            Some(TokenUsage::new(10, 5)),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back.tool_calls()[0].name, "calc");
        match back {
            Message::Assistant { token_usage, .. } => {
                assert_eq!(token_usage.unwrap().total_tokens, 15)
            }
            _ => panic!("expected assistant"),
        }
    }

    /// **Scenario**: TokenUsage::new computes the total; accumulate sums fields.
    #[test]
    fn token_usage_accumulate() {
        let mut usage = TokenUsage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
        usage.accumulate(&TokenUsage::new(1, 2));
        assert_eq!(usage.prompt_tokens, 11);
        assert_eq!(usage.completion_tokens, 7);
        assert_eq!(usage.total_tokens, 18);
    }
}
