//! Anthropic Claude provider implementation

use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or("https://api.anthropic.com/v1")
            .trim_end_matches('/')
    }
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("claude-sonnet-4-20250514")
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(self.default_model());
        let (system, messages) = split_system(&request.messages);

        let api_request = AnthropicRequest {
            model: model.to_string(),
            messages,
            system,
            max_tokens: request.max_tokens.unwrap_or(4096),
            temperature: request.temperature,
            stream: Some(false),
            tools: request.tools.as_ref().map(|tools| {
                tools.iter().map(|t| AnthropicTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.parameters.clone(),
                }).collect()
            }),
            stop_sequences: request.stop,
        };

        let api_key = self.config.api_key.as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ProviderError::AuthenticationFailed)?;

        debug!(model, messages = api_request.messages.len(), "anthropic messages call");

        let mut req = self.client
            .post(format!("{}/messages", self.base_url()))
            .header("x-api-key", api_key)
            .header("content-type", "application/json")
            .json(&api_request);

        if !self.config.headers.contains_key("anthropic-version") {
            req = req.header("anthropic-version", "2023-06-01");
        }
        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        let response = req.send().await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = retry_after_secs(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text, retry_after));
        }

        let api_response: AnthropicResponse = response.json().await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parse_response(api_response)
    }
}

/// System messages go into the top-level `system` field, joined in order.
fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system: Vec<&str> = Vec::new();
    let mut rest = Vec::new();
    for msg in messages {
        if msg.role == Role::System {
            system.push(msg.text_content());
        } else {
            rest.push(AnthropicMessage::from(msg.clone()));
        }
    }
    let system = if system.is_empty() { None } else { Some(system.join("\n\n")) };
    (system, rest)
}

fn parse_response(api_response: AnthropicResponse) -> Result<CompletionResponse, ProviderError> {
    if api_response.content.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    let mut content = String::new();
    let mut tool_calls = Vec::new();

    for block in api_response.content {
        match block {
            ContentBlock::Text { text } => content.push_str(&text),
            ContentBlock::ToolUse { id, name, input } => {
                let arguments = serde_json::to_string(&input)
                    .map_err(|e| ProviderError::Parse(e.to_string()))?;
                tool_calls.push(ToolCall { id, name, arguments });
            }
            ContentBlock::Other => {}
        }
    }

    let finish_reason = match api_response.stop_reason.as_deref() {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        _ => FinishReason::Unknown,
    };

    let usage = Usage {
        prompt_tokens: api_response.usage.input_tokens,
        completion_tokens: api_response.usage.output_tokens,
        total_tokens: api_response.usage.input_tokens + api_response.usage.output_tokens,
    };

    Ok(CompletionResponse {
        id: api_response.id,
        model: api_response.model,
        content: if content.is_empty() { None } else { Some(content) },
        tool_calls,
        finish_reason,
        usage,
    })
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

impl From<ChatMessage> for AnthropicMessage {
    fn from(msg: ChatMessage) -> Self {
        let role = match msg.role {
            Role::Assistant => "assistant",
            Role::User | Role::System | Role::Tool => "user",
        };

        let content = if msg.role == Role::Tool {
            AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                tool_use_id: msg.tool_call_id.unwrap_or_default(),
                content: msg.content.unwrap_or_default(),
            }])
        } else {
            AnthropicContent::Text(msg.content.unwrap_or_default())
        };

        Self {
            role: role.into(),
            content,
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_messages_are_lifted_in_order() {
        let (system, rest) = split_system(&[
            ChatMessage::system("You are an analyst."),
            ChatMessage::system("Use tools."),
            ChatMessage::user("List the files"),
        ]);

        assert_eq!(system.as_deref(), Some("You are an analyst.\n\nUse tools."));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].role, "user");
    }

    #[test]
    fn test_tool_use_becomes_tool_call() {
        let response: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "model": "claude-sonnet-4-20250514",
            "content": [
                { "type": "text", "text": "Reading it." },
                { "type": "tool_use", "id": "tu_1", "name": "read_structured_file",
                  "input": { "file_name": "aapl.json" } }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 12, "output_tokens": 8 }
        }))
        .unwrap();

        let response = parse_response(response).unwrap();
        assert_eq!(response.content.as_deref(), Some("Reading it."));
        assert_eq!(response.tool_calls[0].name, "read_structured_file");
        assert_eq!(response.tool_calls[0].arguments, r#"{"file_name":"aapl.json"}"#);
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.usage.total_tokens, 20);
    }

    #[test]
    fn test_empty_content_is_empty_response() {
        let response: AnthropicResponse =
            serde_json::from_value(serde_json::json!({ "content": [] })).unwrap();
        assert!(matches!(parse_response(response), Err(ProviderError::EmptyResponse)));
    }
}
