//! # fincraft-llm
//!
//! The completion gateway: chat message types, the `LlmProvider` trait and
//! the HTTP providers behind it.

pub mod provider;

pub use provider::gateway::parse_model;
pub use provider::{
    AnthropicProvider, ChatMessage, CompletionRequest, CompletionResponse, FinishReason, Gateway,
    LlmProvider, OpenAIProvider, ProviderConfig, ProviderError, ProviderType, Role, ToolCall,
    ToolChoice, ToolDefinition, Usage, UsageTracker,
};
