//! Chat client for OpenAI-compatible chat completions APIs (Ollama, vLLM).
//!
//! Sends the message log and the tool schema to `/v1/chat/completions` and
//! parses text and tool calls out of the first choice.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use roster_kernel::{BackendError, ChatBackend, ChatMessage, ChatReply, ChatRequest, ToolCall};

/// HTTP chat client.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
}

/// Wire form of a message.
#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: String,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// OpenAI sends a JSON-encoded string, Ollama a plain object.
    #[serde(default)]
    arguments: Value,
}

fn function_type() -> String {
    "function".to_string()
}

/// Request body for /v1/chat/completions.
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a Value>,
    stream: bool,
}

/// Response from /v1/chat/completions.
#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self {
            role: message.role.to_string(),
            content: &message.content,
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: function_type(),
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: Value::String(Value::Object(call.arguments.clone()).to_string()),
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.as_deref(),
        }
    }
}

impl WireToolCall {
    fn into_call(self) -> Result<ToolCall> {
        let arguments = match self.function.arguments {
            Value::Object(map) => map,
            Value::String(s) if s.trim().is_empty() => serde_json::Map::new(),
            Value::String(s) => serde_json::from_str(&s)
                .with_context(|| format!("Invalid arguments for {}: {}", self.function.name, s))?,
            Value::Null => serde_json::Map::new(),
            other => anyhow::bail!("Unexpected arguments for {}: {}", self.function.name, other),
        };
        Ok(ToolCall {
            id: self.id,
            name: self.function.name,
            arguments,
        })
    }
}

impl ChatClient {
    /// Create a new chat client.
    ///
    /// # Arguments
    /// * `base_url` - Server root (e.g., "http://localhost:11434")
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatReply> {
        let body = CompletionRequest {
            model: &request.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: request.tools.as_ref(),
            stream: false,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to chat server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat request failed with status {}: {}", status, body);
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat response")?;

        parse_reply(completion)
    }

    /// Check if the chat server answers.
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/v1/models", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

fn parse_reply(completion: CompletionResponse) -> Result<ChatReply> {
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .context("No choices in chat response")?;

    let tool_calls = message
        .tool_calls
        .into_iter()
        .map(WireToolCall::into_call)
        .collect::<Result<Vec<_>>>()?;

    debug!(calls = tool_calls.len(), "Parsed chat reply");

    Ok(ChatReply {
        content: message.content.unwrap_or_default(),
        tool_calls,
    })
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        self.complete(request)
            .await
            .map_err(|e| BackendError::new(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: Value) -> Result<ChatReply> {
        parse_reply(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn test_client_creation() {
        let client = ChatClient::new("http://localhost:11434/");
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_parse_string_arguments() {
        let reply = parse(serde_json::json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "setBalanceSoftWeight", "arguments": "{\"soft\": 1}"}
                }]
            }}]
        }))
        .unwrap();

        assert_eq!(reply.content, "");
        assert_eq!(reply.tool_calls[0].id.as_deref(), Some("call_1"));
        assert_eq!(reply.tool_calls[0].arguments["soft"], 1);
    }

    #[test]
    fn test_parse_object_arguments() {
        let reply = parse(serde_json::json!({
            "choices": [{"message": {
                "content": "",
                "tool_calls": [
                    {"function": {"name": "setNoOverlapHardWeight", "arguments": {"hard": 1}}},
                    {"function": {"name": "solveScheduler", "arguments": ""}}
                ]
            }}]
        }))
        .unwrap();

        assert_eq!(reply.tool_calls.len(), 2);
        assert_eq!(reply.tool_calls[0].arguments["hard"], 1);
        assert!(reply.tool_calls[1].arguments.is_empty());
    }

    #[test]
    fn test_parse_text_reply() {
        let reply = parse(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello"}}]
        }))
        .unwrap();
        assert_eq!(reply.content, "Hello");
        assert!(reply.tool_calls.is_empty());
    }

    #[test]
    fn test_empty_choices_is_error() {
        assert!(parse(serde_json::json!({"choices": []})).is_err());
    }

    #[test]
    fn test_wire_message_encodes_calls() {
        let message = ChatMessage::assistant_with_calls(
            "",
            vec![ToolCall::new("setBalanceSoftWeight").arg("soft", 1)],
        );
        let json = serde_json::to_value(WireMessage::from(&message)).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert_eq!(
            json["tool_calls"][0]["function"]["arguments"],
            "{\"soft\":1}"
        );
    }
}
