use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use weft_core::config::ModelConfig;
use weft_core::error::{Result, WeftError};
use weft_core::traits::LlmClient;
use weft_core::types::*;

use super::openai;

/// Azure OpenAI client. Uses the same wire format as OpenAI but different
/// endpoint structure and `api-key` header instead of Bearer token.
pub struct AzureClient {
    http: Client,
}

impl AzureClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for AzureClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct AzureResponse {
    #[serde(default)]
    choices: Vec<AzureChoice>,
    #[serde(default)]
    usage: Option<AzureUsage>,
}

#[derive(Deserialize)]
struct AzureChoice {
    message: AzureMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct AzureMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<openai::OaiToolCall>>,
}

#[derive(Deserialize)]
struct AzureUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl LlmClient for AzureClient {
    fn chat(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<ChatTurn>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let resource = config
                .azure_resource
                .as_deref()
                .ok_or_else(|| WeftError::Config("Azure: azure_resource is required".into()))?;
            let deployment = config
                .azure_deployment
                .as_deref()
                .ok_or_else(|| WeftError::Config("Azure: azure_deployment is required".into()))?;
            let api_version = config.azure_api_version.as_deref().unwrap_or("2024-06-01");
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| WeftError::Config("Azure: api_key is required".into()))?;

            let url = format!(
                "https://{resource}.openai.azure.com/openai/deployments/{deployment}/chat/completions?api-version={api_version}"
            );

            // Reuse OpenAI message conversion
            let oai_messages = openai::convert_messages(messages);
            let oai_tools = openai::convert_tools(&tools);

            let body = serde_json::json!({
                "messages": oai_messages,
                "max_tokens": config.max_tokens,
                "temperature": config.temperature,
                "tools": oai_tools,
            });

            debug!(deployment = %deployment, "Sending Azure chat request");

            let response = self
                .http
                .post(&url)
                .header("api-key", api_key)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| WeftError::LlmRequest(e.to_string()))?;

            if !response.status().is_success() {
                return Err(openai::error_for_status(response).await);
            }

            let parsed: AzureResponse = response
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

            Ok(openai::parse_turn(
                choice.message.content,
                choice.message.tool_calls,
                choice.finish_reason,
                usage,
            ))
        })
    }
}
