use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use weft_core::config::ModelConfig;
use weft_core::error::{Result, WeftError};
use weft_core::traits::LlmClient;
use weft_core::types::*;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq, etc.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OaiTool>,
}

#[derive(Serialize)]
pub(crate) struct OaiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OaiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct OaiToolCall {
    id: String,
    r#type: String,
    function: OaiFunction,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct OaiFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
pub(crate) struct OaiTool {
    r#type: String,
    function: OaiToolDef,
}

#[derive(Serialize)]
pub(crate) struct OaiToolDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<OaiUsage>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OaiToolCall>>,
}

#[derive(Deserialize, Debug)]
struct OaiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub(crate) fn convert_tools(tools: &[ToolDefinition]) -> Vec<OaiTool> {
    tools
        .iter()
        .map(|t| OaiTool {
            r#type: "function".to_string(),
            function: OaiToolDef {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
        })
        .collect()
}

pub(crate) fn convert_messages(messages: Vec<ChatMessage>) -> Vec<OaiMessage> {
    let mut oai_msgs = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => {
                oai_msgs.push(OaiMessage {
                    role: "system".to_string(),
                    content: Some(msg.text()),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
            Role::User => {
                // Tool results travel as dedicated "tool" role messages
                let tool_results: Vec<_> = msg
                    .content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } => Some((tool_use_id.clone(), content.clone())),
                        _ => None,
                    })
                    .collect();

                if !tool_results.is_empty() {
                    for (id, content) in tool_results {
                        oai_msgs.push(OaiMessage {
                            role: "tool".to_string(),
                            content: Some(content),
                            tool_calls: None,
                            tool_call_id: Some(id),
                        });
                    }
                } else {
                    oai_msgs.push(OaiMessage {
                        role: "user".to_string(),
                        content: Some(msg.text()),
                        tool_calls: None,
                        tool_call_id: None,
                    });
                }
            }
            Role::Assistant => {
                let tool_uses = msg.tool_uses();
                if tool_uses.is_empty() {
                    oai_msgs.push(OaiMessage {
                        role: "assistant".to_string(),
                        content: Some(msg.text()),
                        tool_calls: None,
                        tool_call_id: None,
                    });
                } else {
                    let text = msg.text();
                    let calls: Vec<OaiToolCall> = tool_uses
                        .iter()
                        .map(|(id, name, input)| OaiToolCall {
                            id: id.to_string(),
                            r#type: "function".to_string(),
                            function: OaiFunction {
                                name: name.to_string(),
                                arguments: input.to_string(),
                            },
                        })
                        .collect();

                    oai_msgs.push(OaiMessage {
                        role: "assistant".to_string(),
                        content: if text.is_empty() { None } else { Some(text) },
                        tool_calls: Some(calls),
                        tool_call_id: None,
                    });
                }
            }
        }
    }

    oai_msgs
}

/// Map a completed choice to a ChatTurn.
pub(crate) fn parse_turn(
    content: Option<String>,
    tool_calls: Option<Vec<OaiToolCall>>,
    finish_reason: Option<String>,
    usage: Usage,
) -> ChatTurn {
    let mut blocks = Vec::new();
    if let Some(text) = content {
        if !text.is_empty() {
            blocks.push(ContentBlock::Text { text });
        }
    }
    for call in tool_calls.unwrap_or_default() {
        let input: serde_json::Value =
            serde_json::from_str(&call.function.arguments).unwrap_or(serde_json::Value::Null);
        blocks.push(ContentBlock::ToolUse {
            id: call.id,
            name: call.function.name,
            input,
        });
    }

    let stop_reason = match finish_reason.as_deref() {
        Some("tool_calls") => StopReason::ToolUse,
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    };

    ChatTurn {
        message: ChatMessage::assistant(blocks),
        stop_reason,
        usage,
    }
}

/// Map an unsuccessful HTTP response to an error. 429s get their own variant
/// so callers can report them back to the rate limiter.
pub(crate) async fn error_for_status(response: reqwest::Response) -> WeftError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        WeftError::RateLimitExceeded(body)
    } else {
        WeftError::LlmRequest(format!("HTTP {}: {}", status, body))
    }
}

impl LlmClient for OpenAiClient {
    fn chat(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<ChatTurn>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let url = config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_API_URL.to_string());
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| WeftError::Config("OpenAI: api_key is required".into()))?;

            let request = ChatRequest {
                model: config.model_id.clone(),
                messages: convert_messages(messages),
                max_tokens: config.max_tokens,
                temperature: Some(config.temperature),
                tools: convert_tools(&tools),
            };

            debug!(model = %config.model_id, "Sending chat request");

            let response = self
                .http
                .post(&url)
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| WeftError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                return Err(error_for_status(response).await);
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| WeftError::LlmParse(e.to_string()))?;

            let usage = parsed
                .usage
                .map(|u| Usage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default();

            let choice = parsed
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| WeftError::LlmParse("response has no choices".into()))?;

            Ok(parse_turn(
                choice.message.content,
                choice.message.tool_calls,
                choice.finish_reason,
                usage,
            ))
        })
    }
}
