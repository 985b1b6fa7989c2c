//! LLM client for the hosted agent runtime.
//!
//! Speaks the OpenRouter-compatible chat-completions protocol: messages in,
//! optional tool calls out. Transport and API failures surface as errors to
//! the agent runner; there is no retry at this layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Message role in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: Option<String>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object.
    pub arguments: String,
}

/// Token usage reported by the API.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn add(&self, other: &TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
        }
    }
}

/// One completion from the model.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub usage: Option<TokenUsage>,
}

/// Abstraction over the hosted chat-completions API.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[serde_json::Value]>,
    ) -> anyhow::Result<ChatResponse>;
}

/// Client for the OpenRouter chat-completions API.
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, OPENROUTER_API_BASE)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[serde_json::Value]>,
    ) -> anyhow::Result<ChatResponse> {
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
        });
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = serde_json::Value::Array(tools.to_vec());
            }
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: serde_json::Value = response.json().await?;

        if !status.is_success() {
            anyhow::bail!(
                "LLM API error ({}): {}",
                status,
                payload["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown error")
            );
        }

        parse_chat_response(&payload)
    }
}

fn parse_chat_response(payload: &serde_json::Value) -> anyhow::Result<ChatResponse> {
    let message = &payload["choices"][0]["message"];
    if message.is_null() {
        anyhow::bail!("LLM response contained no choices");
    }

    let content = message["content"].as_str().map(str::to_string);
    let tool_calls = match &message["tool_calls"] {
        serde_json::Value::Array(calls) if !calls.is_empty() => Some(
            calls
                .iter()
                .map(|c| serde_json::from_value(c.clone()))
                .collect::<Result<Vec<ToolCall>, _>>()?,
        ),
        _ => None,
    };
    let usage = serde_json::from_value(payload["usage"].clone()).ok();

    Ok(ChatResponse {
        content,
        tool_calls,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_text_response() {
        let payload = serde_json::json!({
            "choices": [{
                "message": { "role": "assistant", "content": "All done." }
            }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 8 }
        });
        let response = parse_chat_response(&payload).expect("parse");
        assert_eq!(response.content.as_deref(), Some("All done."));
        assert!(response.tool_calls.is_none());
        assert_eq!(response.usage.expect("usage").completion_tokens, 8);
    }

    #[test]
    fn parses_tool_call_response() {
        let payload = serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "fetch_messages_from_channel",
                            "arguments": "{\"channel_id\":\"C123\",\"days_back\":14}"
                        }
                    }]
                }
            }]
        });
        let response = parse_chat_response(&payload).expect("parse");
        let calls = response.tool_calls.expect("tool calls");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "fetch_messages_from_channel");
        assert_eq!(calls[0].call_type, "function");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let payload = serde_json::json!({ "choices": [] });
        assert!(parse_chat_response(&payload).is_err());
    }

    #[test]
    fn messages_serialize_without_null_fields() {
        let message = ChatMessage::user("hello");
        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "hello");
        assert!(value.get("tool_calls").is_none());
        assert!(value.get("tool_call_id").is_none());
    }
}
