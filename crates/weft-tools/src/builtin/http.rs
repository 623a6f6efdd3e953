use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;

use weft_core::error::{Result, WeftError};
use weft_core::traits::Tool;
use weft_core::types::{ToolContext, ToolResult};

pub struct HttpRequestTool;

#[derive(Deserialize)]
struct HttpRequestInput {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: std::collections::HashMap<String, String>,
    #[serde(default)]
    body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn timeout_secs(&self) -> u64 {
        60
    }

    fn description(&self) -> &str {
        "Make an HTTP request. Returns status and body."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" },
                "method": { "type": "string", "description": "HTTP method (default: GET)" },
                "headers": { "type": "object", "description": "Request headers" },
                "body": { "type": "string", "description": "Request body" }
            },
            "required": ["url"]
        })
    }

    fn execute(
        &self,
        input: serde_json::Value,
        _ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let p: HttpRequestInput = serde_json::from_value(input)
                .map_err(|e| WeftError::ToolValidation(e.to_string()))?;
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| WeftError::ToolExecution {
                    tool: "http_request".into(),
                    message: e.to_string(),
                })?;

            let method = p
                .method
                .to_uppercase()
                .parse::<reqwest::Method>()
                .map_err(|e| WeftError::ToolValidation(format!("Invalid method: {}", e)))?;

            let mut req = client.request(method, &p.url);
            for (k, v) in &p.headers {
                req = req.header(k.as_str(), v.as_str());
            }
            if let Some(body) = p.body {
                req = req.body(body);
            }

            let resp = req.send().await.map_err(|e| WeftError::ToolExecution {
                tool: "http_request".into(),
                message: e.to_string(),
            })?;
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let truncated: String = body.chars().take(10_000).collect();

            let content = format!("HTTP {}\n\n{}", status.as_u16(), truncated);
            if status.is_success() {
                Ok(ToolResult::success(content))
            } else {
                Ok(ToolResult::error(content))
            }
        })
    }
}
