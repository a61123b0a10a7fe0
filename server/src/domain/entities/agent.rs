//! Agent/tool records (§3, §4.6) produced by the LLM agent loop.

use serde::Serialize;

use crate::domain::value_objects::FinishReason;

/// A single function-style tool invocation during an agent iteration.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: String,
    pub result: String,
    pub is_error: bool,
}

/// The result of one `Execute` call to the LLM agent loop (§4.6).
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub content: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub iterations: usize,
    pub finish_reason: FinishReason,
}
