//! OpenAI Chat Completions client implementing `ModelProvider`.
//!
//! Uses the real OpenAI Chat Completions API. Requires `OPENAI_API_KEY` (or
//! explicit config). Tool specs from the request become function tools on the
//! wire; when present, the API may return `tool_calls` in the response.
//!
//! Tool-result messages are folded into user-visible text when building the
//! request. The OpenAI tool-message protocol needs the full call/result pair
//! threading; the engine keeps that correlation in its own state, and folding
//! keeps this client usable with OpenAI-compatible proxies that reject
//! partial tool threads.

use async_trait::async_trait;
use tracing::{debug, trace};

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage, ChatCompletionTool,
        ChatCompletionTools, CreateChatCompletionRequestArgs, FunctionObject,
    },
    Client,
};

use crate::message::{Message, TokenUsage, ToolCall};

use super::{CompletionRequest, ModelProvider, ModelResponse, ProviderError};

/// OpenAI Chat Completions client implementing [`ModelProvider`].
///
/// Uses `OPENAI_API_KEY` from the environment by default; or provide config
/// via [`ChatOpenAI::with_config`]. The request's `model`, `temperature`,
/// `max_tokens`, and tool bindings are applied per call.
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
}

impl ChatOpenAI {
    /// Build client with default config (API key from `OPENAI_API_KEY` env).
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Build client with custom config (e.g. custom API key or base URL).
    pub fn with_config(config: OpenAIConfig) -> Self {
        Self {
            client: Client::with_config(config),
        }
    }

    /// Convert the message list to OpenAI request messages. Assistant
    /// messages contribute their text; tool results are folded into user
    /// messages tagged with the call id.
    fn messages_to_request(messages: &[Message]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .filter_map(|m| match m {
                Message::System { content } => Some(ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(content.as_str()),
                )),
                Message::User { content } => Some(ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(content.as_str()),
                )),
                Message::Assistant { content, .. } => {
                    if content.is_empty() {
                        None
                    } else {
                        Some(ChatCompletionRequestMessage::Assistant(
                            content.as_str().into(),
                        ))
                    }
                }
                Message::Tool {
                    tool_call_id,
                    content,
                } => Some(ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(
                        format!("[tool result {tool_call_id}] {content}").as_str(),
                    ),
                )),
            })
            .collect()
    }
}

impl Default for ChatOpenAI {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for ChatOpenAI {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse, ProviderError> {
        let openai_messages = Self::messages_to_request(&request.messages);
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(request.model.clone());
        args.messages(openai_messages);
        args.temperature(request.temperature as f32);
        args.max_tokens(request.max_tokens);

        if !request.tools.is_empty() {
            let chat_tools: Vec<ChatCompletionTools> = request
                .tools
                .iter()
                .map(|t| {
                    ChatCompletionTools::Function(ChatCompletionTool {
                        function: FunctionObject {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: Some(t.input_schema.clone()),
                            ..Default::default()
                        },
                    })
                })
                .collect();
            args.tools(chat_tools);
        }

        let api_request = args
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        debug!(
            model = %request.model,
            message_count = request.messages.len(),
            tools_count = request.tools.len(),
            temperature = request.temperature,
            "OpenAI chat create"
        );
        if let Ok(body) = serde_json::to_string(&api_request) {
            trace!(request = %body, "OpenAI request body");
        }

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| ProviderError::Api(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        let msg = choice.message;
        let content = msg.content.unwrap_or_default();
        let tool_calls: Vec<ToolCall> = msg
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tc| {
                if let ChatCompletionMessageToolCalls::Function(f) = tc {
                    Some(ToolCall {
                        name: f.function.name,
                        arguments: f.function.arguments,
                        id: Some(f.id),
                    })
                } else {
                    None
                }
            })
            .collect();

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ModelResponse {
            content,
            tool_calls,
            usage,
            cost: None,
        })
    }
}
