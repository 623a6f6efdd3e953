use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeftError};

/// Top-level Weft configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub functions: FunctionsConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Azure OpenAI resource name (provider = "azure").
    #[serde(default)]
    pub azure_resource: Option<String>,
    /// Azure OpenAI deployment name (provider = "azure").
    #[serde(default)]
    pub azure_deployment: Option<String>,
    /// Azure OpenAI API version (provider = "azure").
    #[serde(default)]
    pub azure_api_version: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            azure_resource: None,
            azure_deployment: None,
            azure_api_version: None,
        }
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_model_id() -> String { "gpt-4o-mini".to_string() }
fn default_max_tokens() -> u32 { 4096 }
fn default_temperature() -> f32 { 0.0 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String { "127.0.0.1:8080".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool-use turns per agent run.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Maximum wall-clock duration per agent run.
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,
    /// Instructions applied when an executor omits them.
    #[serde(default = "default_instructions")]
    pub default_instructions: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_duration_secs: default_max_duration(),
            default_instructions: default_instructions(),
        }
    }
}

fn default_max_turns() -> usize { 8 }
fn default_max_duration() -> u64 { 300 }
fn default_instructions() -> String { "You are a helpful assistant.".to_string() }

/// Provider call spacing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum interval between provider call starts, across all runs.
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
    /// Extra spacing added per recent provider rate-limit error.
    #[serde(default = "default_error_backoff")]
    pub error_backoff_ms: u64,
    /// Cap on the accumulated extra spacing.
    #[serde(default = "default_max_error_backoff")]
    pub max_error_backoff_ms: u64,
    /// How long a provider rate-limit error keeps influencing spacing.
    #[serde(default = "default_error_window")]
    pub error_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval(),
            error_backoff_ms: default_error_backoff(),
            max_error_backoff_ms: default_max_error_backoff(),
            error_window_secs: default_error_window(),
        }
    }
}

fn default_min_interval() -> u64 { 1000 }
fn default_error_backoff() -> u64 { 500 }
fn default_max_error_backoff() -> u64 { 5000 }
fn default_error_window() -> u64 { 60 }

/// Function executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionsConfig {
    /// Working directory for command execution.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
    /// Timeout for a single command invocation.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

fn default_working_dir() -> String { ".".to_string() }
fn default_command_timeout() -> u64 { 300 }

/// Workflow runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Per-node invocation cap, multiplied by the executor count. A run that
    /// exceeds the product aborts as failed (cycle protection).
    #[serde(default = "default_max_node_visits")]
    pub max_node_visits: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_node_visits: default_max_node_visits(),
        }
    }
}

fn default_max_node_visits() -> usize { 8 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| WeftError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| WeftError::Config(e.to_string()))
    }

    /// Resolve the function working directory (expand ~).
    pub fn functions_working_dir(&self) -> PathBuf {
        let dir = &self.functions.working_dir;
        if let Some(rest) = dir.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(dir)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
