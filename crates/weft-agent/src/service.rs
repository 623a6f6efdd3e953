use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::info;

use weft_core::config::{AgentConfig, ModelConfig};
use weft_core::error::{Result, WeftError};
use weft_core::traits::{AgentHandle, AgentProvider, LlmClient};
use weft_core::types::AgentProfile;
use weft_llm::RateLimiter;
use weft_tools::ToolRegistry;

use crate::agent::Agent;

/// Agent capability provider.
///
/// Creates agents on demand and caches them by their full configuration
/// tuple, so identical profiles across requests resolve to the same handle.
pub struct AgentService {
    model: ModelConfig,
    limits: AgentConfig,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    limiter: Arc<RateLimiter>,
    working_dir: PathBuf,
    cache: Mutex<HashMap<AgentProfile, Arc<Agent>>>,
}

impl AgentService {
    pub fn new(
        model: ModelConfig,
        limits: AgentConfig,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        limiter: Arc<RateLimiter>,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            model,
            limits,
            llm,
            tools,
            limiter,
            working_dir,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Instructions applied when a caller omits them.
    pub fn default_instructions(&self) -> &str {
        &self.limits.default_instructions
    }

    /// Run a one-off agent message (the `/api/agent/message` path).
    /// All registered tools are available to ad-hoc agents.
    pub async fn run_message(
        &self,
        message: String,
        name: Option<String>,
        agent_id: Option<String>,
        instructions: Option<String>,
    ) -> Result<String> {
        let name = name.unwrap_or_else(|| "agent".to_string());
        let profile = AgentProfile {
            id: agent_id.unwrap_or_else(|| name.clone()),
            name,
            instructions: instructions
                .unwrap_or_else(|| self.limits.default_instructions.clone()),
            tools: vec![],
        };

        let agent = self.get_or_create_agent(&profile)?;
        self.limiter.acquire().await;
        agent.run(message).await
    }

    fn cache_lock(&self) -> std::sync::MutexGuard<'_, HashMap<AgentProfile, Arc<Agent>>> {
        // A poisoned lock only means another thread panicked mid-insert;
        // the map itself is still usable.
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl AgentProvider for AgentService {
    fn get_or_create_agent(&self, profile: &AgentProfile) -> Result<Arc<dyn AgentHandle>> {
        for tool in &profile.tools {
            if !self.tools.contains(tool) {
                return Err(WeftError::Validation(format!(
                    "Agent '{}' requests unknown tool '{}'",
                    profile.name, tool
                )));
            }
        }

        // Lookup-or-insert in one critical section so concurrent requests
        // with the same profile cannot construct duplicate agents.
        let mut cache = self.cache_lock();
        if let Some(agent) = cache.get(profile) {
            return Ok(agent.clone());
        }

        let agent = Arc::new(Agent::new(
            profile.clone(),
            self.model.clone(),
            self.limits.clone(),
            self.llm.clone(),
            self.tools.clone(),
            self.working_dir.clone(),
        ));
        cache.insert(profile.clone(), agent.clone());
        info!(
            agent = %profile.name,
            agent_id = %profile.id,
            tools = profile.tools.len(),
            "Created agent"
        );
        Ok(agent)
    }
}
