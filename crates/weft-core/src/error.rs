use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeftError {
    // Workflow errors
    #[error("Invalid workflow: {0}")]
    Validation(String),

    #[error("Agent executor '{executor}' failed: {message}")]
    AgentInvocation { executor: String, message: String },

    #[error("Function executor '{function}' failed: {message}")]
    FunctionExecution { function: String, message: String },

    #[error("Workflow exceeded {0} node invocations")]
    TraversalLimitExceeded(usize),

    #[error("Workflow cancelled")]
    Cancelled,

    // LLM errors
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    // Agent errors
    #[error("Agent exceeded max turns ({0})")]
    MaxTurnsExceeded(usize),

    #[error("Agent exceeded max duration ({0}s)")]
    MaxDurationExceeded(u64),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WeftError {
    /// Short machine-readable tag, recorded in execution steps and responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::AgentInvocation { .. } => "agent_invocation_error",
            Self::FunctionExecution { .. } => "function_execution_error",
            Self::TraversalLimitExceeded(_) => "traversal_limit_exceeded",
            Self::Cancelled => "cancelled",
            Self::RateLimitExceeded(_) => "rate_limit_exceeded",
            Self::LlmRequest(_) => "llm_request_error",
            Self::LlmParse(_) => "llm_parse_error",
            Self::ToolNotFound(_) => "tool_not_found",
            Self::ToolExecution { .. } => "tool_execution_error",
            Self::ToolTimeout { .. } => "tool_timeout",
            Self::ToolValidation(_) => "tool_validation_error",
            Self::MaxTurnsExceeded(_) => "max_turns_exceeded",
            Self::MaxDurationExceeded(_) => "max_duration_exceeded",
            Self::Config(_) | Self::ConfigNotFound(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }

    /// Whether this error originated as a provider-side rate limit.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimitExceeded(_))
    }
}

pub type Result<T> = std::result::Result<T, WeftError>;
