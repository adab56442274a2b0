//! Conversation memory for one run

use fincraft_llm::ChatMessage;
use fincraft_tools::ToolResult;
use serde_json::{json, Value};

/// Append-only message log, seeded with the user's task.
///
/// Messages are never reordered or removed. Tool exchanges are stored as a
/// pair: an assistant message naming the tool and its arguments, followed by
/// a user message holding the serialized result.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(task)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn task(&self) -> &str {
        self.messages.first().map(ChatMessage::text_content).unwrap_or("")
    }

    /// Append the request/result pair of one tool call
    pub fn record_tool_exchange(&mut self, tool_name: &str, args: &Value, result: &ToolResult) {
        let request = json!({ "tool_name": tool_name, "args": args });
        self.messages.push(ChatMessage::assistant(request.to_string()));
        self.messages.push(ChatMessage::user(result.to_message()));
    }

    /// `rules` followed by the memory, as sent to the model
    pub fn compose(&self, rules: &[ChatMessage]) -> Vec<ChatMessage> {
        rules.iter().chain(self.messages.iter()).cloned().collect()
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }
}
