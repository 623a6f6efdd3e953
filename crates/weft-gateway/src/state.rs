use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use weft_agent::AgentService;
use weft_core::config::AppConfig;
use weft_llm::RateLimiter;
use weft_workflow::WorkflowService;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: AppConfig,
    pub workflows: Arc<WorkflowService>,
    pub agents: Arc<AgentService>,
    pub limiter: Arc<RateLimiter>,
    /// Server-wide shutdown token; per-run tokens are children of it so
    /// in-flight workflows stop at the next node boundary on shutdown.
    pub shutdown: CancellationToken,
}
