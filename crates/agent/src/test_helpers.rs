//! Shared test helpers: a scripted provider and response builders.

use std::collections::VecDeque;
use std::sync::Mutex;
use tinyreact_core::error::ProviderError;
use tinyreact_core::message::{Message, MessageToolCall};
use tinyreact_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

type Scripted = Result<ProviderResponse, ProviderError>;

/// A mock provider that replays a script of responses.
///
/// Each call to `complete` returns the next entry. Once the script is
/// exhausted the provider either repeats its fallback response or panics.
/// Requests without tools (summarisation calls) can be routed to a fixed
/// summary instead so they don't consume the script.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Option<ProviderResponse>,
    summary: Option<ProviderResponse>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            summary: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the same text.
    pub fn text(text: &str) -> Self {
        Self::repeating(make_text_response(text))
    }

    /// Answers every call with `response`.
    pub fn repeating(response: ProviderResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(Vec::new())
        }
    }

    /// Answers from `responses` in order, then fails the test.
    pub fn sequence(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    /// Answer summarisation requests (no tools offered) with `text`.
    pub fn with_summary(mut self, text: &str) -> Self {
        self.summary = Some(make_text_response(text));
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let summarising = request.tools.is_empty();
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if let (true, Some(summary)) = (summarising, &self.summary) {
            return Ok(summary.clone());
        }
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.fallback {
            Some(response) => Ok(response.clone()),
            None => panic!("ScriptedProvider: no more responses (call #{call})"),
        }
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls(thought, tool_calls),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall::new(format!("call_{name}"), name, args.to_string())
}
