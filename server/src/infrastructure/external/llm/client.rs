//! `ChatCompletionClient` trait and the concrete `HttpChatClient` adapter (A3).

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::value_objects::FinishReason;
use crate::shared::error::AgentError;

use super::wire::{ChatCompletionRequestWire, ChatCompletionResponseWire, ChatMessageWire, ToolDefinitionWire};

/// One completed chat turn: the assistant's message plus its classified
/// finish reason. Distinct from `AgentResult`, which is the agent loop's
/// (C6) accumulated result across possibly many turns.
#[derive(Debug, Clone)]
pub struct ChatCompletionResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<super::wire::ToolCallWire>,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessageWire>,
    pub tools: Vec<ToolDefinitionWire>,
}

/// Out-of-scope collaborator (§1): the LLM HTTP client protocol is treated
/// as an opaque chat-completion RPC that may expose tool-calling.
#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    async fn complete(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse, AgentError>;
}

pub struct HttpChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl HttpChatClient {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        max_tokens: u32,
        temperature: f32,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url,
            api_key,
            model,
            max_tokens,
            temperature,
        }
    }
}

#[async_trait]
impl ChatCompletionClient for HttpChatClient {
    async fn complete(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse, AgentError> {
        let body = ChatCompletionRequestWire {
            model: self.model.clone(),
            messages: request.messages,
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(request.tools)
            },
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: ChatCompletionResponseWire = response.json().await?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Transport("chat completion response had no choices".to_string()))?;

        Ok(ChatCompletionResponse {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
            finish_reason: FinishReason::from_wire(&choice.finish_reason),
        })
    }
}
