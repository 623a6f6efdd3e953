pub mod config;
pub mod error;
pub mod step;
pub mod traits;
pub mod types;
pub mod workflow;

pub use config::AppConfig;
pub use error::{Result, WeftError};
pub use step::ExecutionStep;
pub use types::*;
pub use workflow::{EdgeKind, EdgeSpec, ExecutorSpec, WorkflowKind, WorkflowSpec};
