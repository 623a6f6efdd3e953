pub mod builder;
pub mod diagram;
pub mod executor;
pub mod log;
pub mod runner;
pub mod service;

pub use builder::{ExecutableGraph, WorkflowBuilder};
pub use diagram::workflow_to_mermaid;
pub use executor::{AgentExecutor, Executor, FunctionExecutor};
pub use log::StepLog;
pub use runner::run_graph;
pub use service::{RunError, RunOutcome, WorkflowService};
