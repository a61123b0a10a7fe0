//! Tagged finish-reason for the LLM agent loop.
//!
//! The wire string mapping lives only in the HTTP transport adapter
//! (`infrastructure::external::llm`); core logic never matches on strings.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Other(String),
}

impl FinishReason {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            other => FinishReason::Other(other.to_string()),
        }
    }
}
