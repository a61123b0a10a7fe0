//! LLM chat-completion adapter (A3).

mod client;
mod wire;

pub use client::{ChatCompletionClient, ChatCompletionRequest, ChatCompletionResponse, HttpChatClient};
pub use wire::{ChatMessageWire, ToolCallWire, ToolDefinitionWire};
