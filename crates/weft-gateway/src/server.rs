use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use weft_agent::AgentService;
use weft_core::config::AppConfig;
use weft_llm::RateLimiter;
use weft_workflow::WorkflowService;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway server built on axum.
pub struct GatewayServer {
    config: AppConfig,
    workflows: Arc<WorkflowService>,
    agents: Arc<AgentService>,
    limiter: Arc<RateLimiter>,
}

impl GatewayServer {
    pub fn new(
        config: AppConfig,
        workflows: Arc<WorkflowService>,
        agents: Arc<AgentService>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            config,
            workflows,
            agents,
            limiter,
        }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            workflows: self.workflows.clone(),
            agents: self.agents.clone(),
            limiter: self.limiter.clone(),
            shutdown: shutdown.clone(),
        });

        let app = Router::new()
            .route("/", get(routes::root))
            .route("/api/health", get(routes::health))
            .route("/api/workflow", post(routes::execute_workflow))
            .route("/api/workflow/diagram", post(routes::workflow_diagram))
            .route("/api/agent/message", post(routes::agent_message))
            .layer(CorsLayer::permissive())
            .with_state(state);

        let listener = TcpListener::bind(&self.config.server.bind).await?;
        info!(bind = %self.config.server.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
