use serde::{Deserialize, Serialize};

use crate::workflow::{EdgeKind, ExecutorKind};

/// One structured entry in the execution log. Appended in order during the
/// build and run phases and returned verbatim to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ExecutionStep {
    ExecutorCreated {
        executor: String,
        #[serde(rename = "type")]
        kind: ExecutorKind,
    },
    EdgeAdded {
        from: String,
        to: String,
        #[serde(rename = "type")]
        kind: EdgeKind,
    },
    WorkflowBuilt {
        executor_count: usize,
        edge_count: usize,
    },
    WorkflowExecutionStarted {
        input_length: usize,
    },
    ExecutorStart {
        executor: String,
        input_length: usize,
    },
    ExecutorSuccess {
        executor: String,
        output_length: usize,
    },
    ExecutorError {
        executor: String,
        error: String,
        error_type: String,
    },
    WorkflowExecutionCompleted {
        output_length: usize,
    },
    WorkflowExecutionFailed {
        error: String,
        error_type: String,
    },
}

impl ExecutionStep {
    /// The serialized `step` tag, used in logs and tests.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ExecutorCreated { .. } => "executor_created",
            Self::EdgeAdded { .. } => "edge_added",
            Self::WorkflowBuilt { .. } => "workflow_built",
            Self::WorkflowExecutionStarted { .. } => "workflow_execution_started",
            Self::ExecutorStart { .. } => "executor_start",
            Self::ExecutorSuccess { .. } => "executor_success",
            Self::ExecutorError { .. } => "executor_error",
            Self::WorkflowExecutionCompleted { .. } => "workflow_execution_completed",
            Self::WorkflowExecutionFailed { .. } => "workflow_execution_failed",
        }
    }
}
