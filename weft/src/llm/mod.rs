//! Model provider abstraction for the model/llm node executor.
//!
//! The executor depends on a callable that turns a message list into an
//! assistant reply with optional tool calls and token/cost accounting; this
//! module defines the trait, the mock used in tests, and the OpenAI-backed
//! implementation.

mod mock;
mod openai;

pub use mock::MockModel;
pub use openai::ChatOpenAI;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::{Message, TokenUsage, ToolCall};
use crate::tools::ToolSpec;

/// Error from a model provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("model request build failed: {0}")]
    Request(String),
    #[error("model API error: {0}")]
    Api(String),
    #[error("model returned no choices")]
    EmptyResponse,
}

/// One completion request: effective message list plus sampling parameters
/// and optional tool bindings.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Tools offered to the model; empty disables tool calling.
    pub tools: Vec<ToolSpec>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>, model: impl Into<String>) -> Self {
        Self {
            messages,
            provider: "openai".into(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1000,
            tools: vec![],
        }
    }
}

/// Response from a model completion: assistant text, requested tool calls,
/// and accounting.
#[derive(Clone, Debug, Default)]
pub struct ModelResponse {
    pub content: String,
    /// Tool calls from this turn; empty means the model answered directly.
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
    /// Provider-reported cost for this call, when available.
    pub cost: Option<f64>,
}

/// Model provider: given a request, returns the assistant reply.
///
/// **Interaction**: Called by the model node executor; implementations are
/// [`MockModel`] (tests, scripted rounds) and [`ChatOpenAI`].
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse, ProviderError>;
}
