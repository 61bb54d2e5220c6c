//! Mock model provider for tests.
//!
//! Returns scripted responses in order, repeating the last one when the
//! script runs out. Configurable tool-call rounds exercise the tool loop and
//! its max-calls finalization path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::message::{TokenUsage, ToolCall};

use super::{CompletionRequest, ModelProvider, ModelResponse, ProviderError};

/// Scripted model: each call pops the next response; the last response
/// repeats once the script is exhausted.
///
/// **Interaction**: Implements [`ModelProvider`]; used by node and engine
/// tests in place of a real provider.
pub struct MockModel {
    responses: Vec<ModelResponse>,
    calls: AtomicUsize,
    seen_requests: Mutex<Vec<CompletionRequest>>,
}

impl MockModel {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses,
            calls: AtomicUsize::new(0),
            seen_requests: Mutex::new(Vec::new()),
        }
    }

    /// One fixed assistant reply, no tool calls.
    pub fn with_reply(content: impl Into<String>) -> Self {
        Self::new(vec![ModelResponse {
            content: content.into(),
            tool_calls: vec![],
            usage: Some(TokenUsage::new(12, 8)),
            cost: Some(0.0004),
        }])
    }

    /// A model that always requests the named tool. Combined with a
    /// max-tool-calls cap this drives the finalization branch.
    pub fn always_calling(tool_name: impl Into<String>) -> Self {
        let tool_name = tool_name.into();
        Self::new(vec![ModelResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                name: tool_name,
                arguments: "{}".into(),
                id: Some("call-1".into()),
            }],
            usage: Some(TokenUsage::new(10, 5)),
            cost: Some(0.0003),
        }])
    }

    /// First call requests the tool, second call answers. Exercises one tool
    /// round followed by the direct-answer exit.
    pub fn one_tool_round(tool_name: impl Into<String>, final_reply: impl Into<String>) -> Self {
        Self::new(vec![
            ModelResponse {
                content: String::new(),
                tool_calls: vec![ToolCall {
                    name: tool_name.into(),
                    arguments: "{}".into(),
                    id: Some("call-1".into()),
                }],
                usage: Some(TokenUsage::new(10, 5)),
                cost: Some(0.0003),
            },
            ModelResponse {
                content: final_reply.into(),
                tool_calls: vec![],
                usage: Some(TokenUsage::new(20, 10)),
                cost: Some(0.0006),
            },
        ])
    }

    /// Number of completed calls.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests observed so far, cloned.
    pub fn seen_requests(&self) -> Vec<CompletionRequest> {
        self.seen_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for MockModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse, ProviderError> {
        self.seen_requests.lock().unwrap().push(request.clone());
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .responses
            .get(index)
            .or_else(|| self.responses.last())
            .cloned()
            .ok_or(ProviderError::EmptyResponse)?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    /// **Scenario**: Scripted responses play in order; the last repeats.
    #[tokio::test]
    async fn script_plays_in_order_then_repeats() {
        let mock = MockModel::one_tool_round("get_time", "done");
        let request = CompletionRequest::new(vec![Message::user("hi")], "m1");
        let first = mock.complete(&request).await.unwrap();
        assert_eq!(first.tool_calls.len(), 1);
        let second = mock.complete(&request).await.unwrap();
        assert_eq!(second.content, "done");
        let third = mock.complete(&request).await.unwrap();
        assert_eq!(third.content, "done");
        assert_eq!(mock.call_count(), 3);
    }

    /// **Scenario**: Observed requests are recorded for assertion on the
    /// effective message list.
    #[tokio::test]
    async fn records_seen_requests() {
        let mock = MockModel::with_reply("hello");
        let request = CompletionRequest::new(
            vec![Message::system("sys"), Message::user("hi")],
            "m1",
        );
        mock.complete(&request).await.unwrap();
        let seen = mock.seen_requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages[0].content(), "sys");
    }
}
