use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use weft_agent::AgentService;
use weft_core::config::AppConfig;
use weft_core::traits::AgentProvider;
use weft_core::workflow::WorkflowSpec;
use weft_gateway::GatewayServer;
use weft_llm::RateLimiter;
use weft_tools::ToolRegistry;
use weft_workflow::{workflow_to_mermaid, WorkflowService};

#[derive(Parser)]
#[command(name = "weft", version, about = "Dynamic workflow orchestration service")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "weft.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server (default)
    Serve,
    /// Show the resolved configuration
    Config,
    /// Render a workflow JSON file as a Mermaid diagram
    Diagram {
        /// Path to a workflow definition (JSON)
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weft=info,warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = AppConfig::load(&cli.config)?;
            serve(config).await
        }
        Commands::Config => {
            let config = AppConfig::load(&cli.config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Diagram { file } => {
            let content = std::fs::read_to_string(&file)?;
            let spec: WorkflowSpec = serde_json::from_str(&content)?;
            println!("{}", workflow_to_mermaid(&spec));
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
    let registry = Arc::new(ToolRegistry::with_builtins());
    let llm = Arc::from(weft_llm::create_client(&config.model));
    let working_dir = config.functions_working_dir();

    let agents = Arc::new(AgentService::new(
        config.model.clone(),
        config.agent.clone(),
        llm,
        registry.clone(),
        limiter.clone(),
        working_dir.clone(),
    ));
    let provider: Arc<dyn AgentProvider> = agents.clone();
    let workflows = Arc::new(WorkflowService::new(
        &config,
        provider,
        registry,
        limiter.clone(),
        working_dir,
    ));

    let server = GatewayServer::new(config, workflows, agents, limiter);

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            token.cancel();
        }
    });

    server.run(shutdown).await
}
