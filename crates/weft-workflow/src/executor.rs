use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use weft_core::error::{Result, WeftError};
use weft_core::traits::AgentHandle;
use weft_core::types::ToolContext;
use weft_core::workflow::ExecutorKind;
use weft_llm::RateLimiter;
use weft_tools::ToolRegistry;

/// A live workflow node: either an agent or a registered function.
pub enum Executor {
    Agent(AgentExecutor),
    Function(FunctionExecutor),
}

impl Executor {
    pub fn name(&self) -> &str {
        match self {
            Self::Agent(e) => &e.name,
            Self::Function(e) => &e.name,
        }
    }

    pub fn kind(&self) -> ExecutorKind {
        match self {
            Self::Agent(_) => ExecutorKind::Agent,
            Self::Function(_) => ExecutorKind::Function,
        }
    }

    /// Process one message and return the output text.
    pub async fn invoke(&self, input: &str) -> Result<String> {
        match self {
            Self::Agent(e) => e.invoke(input).await,
            Self::Function(e) => e.invoke(input).await,
        }
    }
}

/// Wraps one cached agent handle. Every invocation passes through the
/// process-wide rate limiter before reaching the provider.
pub struct AgentExecutor {
    pub name: String,
    handle: Arc<dyn AgentHandle>,
    limiter: Arc<RateLimiter>,
}

impl AgentExecutor {
    pub fn new(name: String, handle: Arc<dyn AgentHandle>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            name,
            handle,
            limiter,
        }
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        debug!(executor = %self.name, input_length = input.len(), "Agent executor invoked");
        self.limiter.acquire().await;
        self.handle
            .run(input.to_string())
            .await
            .map_err(|e| match e {
                // Rate limits stay distinguishable so the caller can report
                // them back to the limiter.
                WeftError::RateLimitExceeded(_) => e,
                other => WeftError::AgentInvocation {
                    executor: self.name.clone(),
                    message: other.to_string(),
                },
            })
    }
}

/// Invokes a registered function with the incoming message merged into its
/// configured parameters.
pub struct FunctionExecutor {
    pub name: String,
    function_name: String,
    parameters: HashMap<String, serde_json::Value>,
    registry: Arc<ToolRegistry>,
    working_dir: PathBuf,
}

impl FunctionExecutor {
    pub fn new(
        name: String,
        function_name: String,
        parameters: HashMap<String, serde_json::Value>,
        registry: Arc<ToolRegistry>,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            name,
            function_name,
            parameters,
            registry,
            working_dir,
        }
    }

    async fn invoke(&self, input: &str) -> Result<String> {
        debug!(
            executor = %self.name,
            function = %self.function_name,
            "Function executor invoked"
        );

        let mut args = serde_json::Map::new();
        for (k, v) in &self.parameters {
            args.insert(k.clone(), v.clone());
        }
        args.insert("input".to_string(), serde_json::Value::String(input.to_string()));

        let ctx = ToolContext {
            working_dir: self.working_dir.clone(),
        };

        let result = self
            .registry
            .execute(&self.function_name, serde_json::Value::Object(args), ctx)
            .await
            .map_err(|e| WeftError::FunctionExecution {
                function: self.function_name.clone(),
                message: e.to_string(),
            })?;

        if result.is_error {
            return Err(WeftError::FunctionExecution {
                function: self.function_name.clone(),
                message: result.content,
            });
        }
        Ok(result.content)
    }
}
