use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tracing::{debug, error, info};

use weft_core::config::{AgentConfig, ModelConfig};
use weft_core::error::{Result, WeftError};
use weft_core::traits::{AgentHandle, LlmClient};
use weft_core::types::*;
use weft_tools::ToolRegistry;

/// A configured, reusable agent: instructions plus an enabled tool set.
///
/// `run` drives a bounded tool-use loop: ask the model, execute any requested
/// tools, feed the results back, stop when the model ends its turn.
pub struct Agent {
    profile: AgentProfile,
    model: ModelConfig,
    limits: AgentConfig,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    tool_defs: Vec<ToolDefinition>,
    working_dir: PathBuf,
}

impl Agent {
    pub fn new(
        profile: AgentProfile,
        model: ModelConfig,
        limits: AgentConfig,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        working_dir: PathBuf,
    ) -> Self {
        let tool_defs = tools.definitions_for(&profile.tools);
        Self {
            profile,
            model,
            limits,
            llm,
            tools,
            tool_defs,
            working_dir,
        }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    async fn run_inner(&self, input: String) -> Result<String> {
        let start = Instant::now();
        let max_turns = self.limits.max_turns;
        let max_duration = Duration::from_secs(self.limits.max_duration_secs);

        let mut messages = vec![
            ChatMessage::system(&self.profile.instructions),
            ChatMessage::user(input),
        ];

        let tool_ctx = ToolContext {
            working_dir: self.working_dir.clone(),
        };

        let mut total_usage = Usage::default();

        for turn in 0..max_turns {
            if start.elapsed() > max_duration {
                return Err(WeftError::MaxDurationExceeded(
                    self.limits.max_duration_secs,
                ));
            }

            debug!(agent = %self.profile.name, turn, "Starting agent turn");

            let chat_turn = self
                .llm
                .chat(&self.model, messages.clone(), &self.tool_defs)
                .await?;

            total_usage.input_tokens += chat_turn.usage.input_tokens;
            total_usage.output_tokens += chat_turn.usage.output_tokens;

            let text = chat_turn.message.text();
            let tool_uses: Vec<(String, String, serde_json::Value)> = chat_turn
                .message
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();
            messages.push(chat_turn.message);

            if tool_uses.is_empty() {
                info!(
                    agent = %self.profile.name,
                    turns = turn + 1,
                    input_tokens = total_usage.input_tokens,
                    output_tokens = total_usage.output_tokens,
                    "Agent run complete"
                );
                return Ok(text);
            }

            // Execute requested tools and feed results back
            let mut result_blocks = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in tool_uses {
                debug!(agent = %self.profile.name, tool = %name, "Executing tool");
                let result = match self.tools.execute(&name, input, tool_ctx.clone()).await {
                    Ok(r) => r,
                    Err(e) => {
                        error!(tool = %name, error = %e, "Tool execution failed");
                        ToolResult::error(e.to_string())
                    }
                };
                result_blocks.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content: result.content,
                    is_error: result.is_error,
                });
            }

            messages.push(ChatMessage {
                role: Role::User,
                content: result_blocks,
                timestamp: Some(chrono::Utc::now()),
            });
        }

        Err(WeftError::MaxTurnsExceeded(max_turns))
    }
}

impl AgentHandle for Agent {
    fn run(&self, input: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(self.run_inner(input))
    }
}
