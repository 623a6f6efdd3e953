use std::sync::Arc;

use futures::future::BoxFuture;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// LLM chat client — multi-provider, non-streaming.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive the completed turn.
    fn chat(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<ChatTurn>>;
}

/// Tool — extensible tool execution.
pub trait Tool: Send + Sync + 'static {
    /// Tool name (used in LLM tool calls and the function registry).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input and context.
    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>>;

    /// Timeout in seconds for this tool.
    fn timeout_secs(&self) -> u64 {
        30
    }
}

/// A reusable agent: instructions plus an enabled tool set, runnable against
/// a text input.
pub trait AgentHandle: Send + Sync + 'static {
    /// Run the agent over the input and return its final text.
    fn run(&self, input: String) -> BoxFuture<'_, Result<String>>;
}

/// Agent capability provider — creates and caches agent handles.
///
/// Identical profiles must resolve to the same underlying handle so repeated
/// workflow builds do not pay redundant setup cost.
pub trait AgentProvider: Send + Sync + 'static {
    fn get_or_create_agent(&self, profile: &AgentProfile) -> Result<Arc<dyn AgentHandle>>;
}
