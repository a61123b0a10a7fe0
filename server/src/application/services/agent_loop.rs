//! LLM Agent Loop (C6) — a bounded multi-turn tool-calling loop over an
//! opaque chat-completion transport.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::entities::{AgentResult, ToolCallRecord};
use crate::domain::value_objects::FinishReason;
use crate::infrastructure::external::llm::{ChatCompletionClient, ChatCompletionRequest, ChatMessageWire, ToolCallWire, ToolDefinitionWire};
use crate::infrastructure::external::search::SearchProvider;
use crate::shared::error::AgentError;

const DEFAULT_MAX_ITERATIONS: usize = 10;

pub struct AgentLoop {
    chat_client: Arc<dyn ChatCompletionClient>,
    search_provider: Option<Arc<dyn SearchProvider>>,
}

impl AgentLoop {
    pub fn new(chat_client: Arc<dyn ChatCompletionClient>, search_provider: Option<Arc<dyn SearchProvider>>) -> Self {
        Self { chat_client, search_provider }
    }

    /// `Execute(ctx, {system_prompt, user_message, max_iterations})` (§4.6).
    pub async fn execute(
        &self,
        system_prompt: String,
        user_message: String,
        max_iterations: Option<usize>,
    ) -> Result<AgentResult, AgentError> {
        let max_iterations = max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS).max(1);
        let tools = if self.search_provider.is_some() {
            vec![ToolDefinitionWire::web_search()]
        } else {
            Vec::new()
        };

        let mut messages = vec![ChatMessageWire::system(system_prompt), ChatMessageWire::user(user_message)];
        let mut tool_call_records = Vec::new();

        for iteration in 1..=max_iterations {
            let response = self
                .chat_client
                .complete(ChatCompletionRequest { messages: messages.clone(), tools: tools.clone() })
                .await?;

            match response.finish_reason {
                FinishReason::Stop => {
                    return Ok(AgentResult {
                        content: response.content.unwrap_or_default(),
                        tool_calls: tool_call_records,
                        iterations: iteration,
                        finish_reason: FinishReason::Stop,
                    });
                }
                FinishReason::ToolCalls if response.tool_calls.is_empty() => {
                    return Ok(AgentResult {
                        content: response.content.unwrap_or_default(),
                        tool_calls: tool_call_records,
                        iterations: iteration,
                        finish_reason: FinishReason::ToolCalls,
                    });
                }
                FinishReason::ToolCalls => {
                    messages.push(ChatMessageWire::assistant(response.content.clone(), Some(response.tool_calls.clone())));

                    for call in &response.tool_calls {
                        let (result_text, is_error) = self.invoke_tool(call).await;
                        tool_call_records.push(ToolCallRecord {
                            tool_name: call.function.name.clone(),
                            arguments: call.function.arguments.clone(),
                            result: result_text.clone(),
                            is_error,
                        });
                        messages.push(ChatMessageWire::tool_result(call.id.clone(), result_text));
                    }

                    // Strip the system prompt after the first iteration so it
                    // is never resent once the assistant/tool trail carries it.
                    if iteration == 1 {
                        if matches!(messages.first(), Some(m) if m.role == "system") {
                            messages.remove(0);
                        }
                    }
                }
                FinishReason::Other(other) => {
                    return Ok(AgentResult {
                        content: response.content.unwrap_or_default(),
                        tool_calls: tool_call_records,
                        iterations: iteration,
                        finish_reason: FinishReason::Other(other),
                    });
                }
            }
        }

        Err(AgentError::MaxTurnsExceeded(max_iterations))
    }

    /// Tool execution errors are captured, never propagated (§4.6).
    async fn invoke_tool(&self, call: &ToolCallWire) -> (String, bool) {
        if call.function.name != "web_search" {
            return (format!("unknown tool: {}", call.function.name), true);
        }

        let Some(search_provider) = &self.search_provider else {
            return ("web_search is not configured".to_string(), true);
        };

        let query = match serde_json::from_str::<Value>(&call.function.arguments) {
            Ok(args) => args.get("query").and_then(|q| q.as_str()).map(|q| q.to_string()),
            Err(_) => None,
        };
        let Some(query) = query else {
            return ("web_search call missing required \"query\" argument".to_string(), true);
        };

        match search_provider.search(&query).await {
            Ok(response) => (response.render(), false),
            Err(err) => (format!("web_search failed: {err}"), true),
        }
    }
}
