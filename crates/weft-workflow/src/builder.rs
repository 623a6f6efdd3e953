use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use weft_core::error::{Result, WeftError};
use weft_core::step::ExecutionStep;
use weft_core::traits::AgentProvider;
use weft_core::workflow::{EdgeKind, ExecutorSpec, WorkflowSpec};
use weft_llm::RateLimiter;
use weft_tools::ToolRegistry;

use crate::executor::{AgentExecutor, Executor, FunctionExecutor};
use crate::log::StepLog;

/// The materialized graph for one run: live executors plus the Direct-edge
/// adjacency, in edge-declaration order. Owned exclusively by that run.
pub struct ExecutableGraph {
    executors: HashMap<String, Executor>,
    adjacency: HashMap<String, Vec<String>>,
    start: String,
}

impl ExecutableGraph {
    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn executor(&self, name: &str) -> Option<&Executor> {
        self.executors.get(name)
    }

    pub fn executor_count(&self) -> usize {
        self.executors.len()
    }

    pub fn executor_names(&self) -> Vec<&str> {
        self.executors.keys().map(|s| s.as_str()).collect()
    }

    /// Downstream executors reachable via Direct edges, in insertion order.
    pub fn successors(&self, name: &str) -> &[String] {
        self.adjacency.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Validates a workflow spec and materializes it into an executable graph.
pub struct WorkflowBuilder {
    provider: Arc<dyn AgentProvider>,
    registry: Arc<ToolRegistry>,
    limiter: Arc<RateLimiter>,
    default_instructions: String,
    working_dir: PathBuf,
}

impl WorkflowBuilder {
    pub fn new(
        provider: Arc<dyn AgentProvider>,
        registry: Arc<ToolRegistry>,
        limiter: Arc<RateLimiter>,
        default_instructions: String,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            provider,
            registry,
            limiter,
            default_instructions,
            working_dir,
        }
    }

    /// Build the graph, appending `executor_created`, `edge_added`, and
    /// `workflow_built` steps to the log as construction progresses.
    pub fn build(&self, spec: &WorkflowSpec, log: &mut StepLog) -> Result<ExecutableGraph> {
        // Name uniqueness and start membership are checked before anything
        // is instantiated, so these failures leave the log untouched.
        let mut names = HashSet::new();
        for executor in &spec.executors {
            if !names.insert(executor.name()) {
                return Err(WeftError::Validation(format!(
                    "Duplicate executor name '{}'",
                    executor.name()
                )));
            }
        }
        if !names.contains(spec.start_executor.as_str()) {
            return Err(WeftError::Validation(format!(
                "Start executor '{}' not found",
                spec.start_executor
            )));
        }

        let mut executors = HashMap::new();
        for executor_spec in &spec.executors {
            let executor = self.instantiate(executor_spec)?;
            debug!(
                executor = %executor_spec.name(),
                kind = %executor_spec.kind(),
                "Executor created"
            );
            log.push(ExecutionStep::ExecutorCreated {
                executor: executor_spec.name().to_string(),
                kind: executor_spec.kind(),
            });
            executors.insert(executor_spec.name().to_string(), executor);
        }

        // Direct edges get executable transitions, in declaration order.
        // Other edge kinds are recorded but stay inert.
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for edge in &spec.edges {
            if !executors.contains_key(&edge.from_executor) {
                return Err(WeftError::Validation(format!(
                    "Edge references unknown executor '{}'",
                    edge.from_executor
                )));
            }
            if !executors.contains_key(&edge.to_executor) {
                return Err(WeftError::Validation(format!(
                    "Edge references unknown executor '{}'",
                    edge.to_executor
                )));
            }

            if edge.edge_type == EdgeKind::Direct {
                adjacency
                    .entry(edge.from_executor.clone())
                    .or_default()
                    .push(edge.to_executor.clone());
            }
            log.push(ExecutionStep::EdgeAdded {
                from: edge.from_executor.clone(),
                to: edge.to_executor.clone(),
                kind: edge.edge_type,
            });
        }

        log.push(ExecutionStep::WorkflowBuilt {
            executor_count: executors.len(),
            edge_count: spec.edges.len(),
        });
        info!(
            workflow = %spec.name,
            executors = executors.len(),
            edges = spec.edges.len(),
            "Workflow built"
        );

        Ok(ExecutableGraph {
            executors,
            adjacency,
            start: spec.start_executor.clone(),
        })
    }

    fn instantiate(&self, spec: &ExecutorSpec) -> Result<Executor> {
        match spec {
            ExecutorSpec::Agent { name, .. } => {
                let profile = spec
                    .agent_profile(&self.default_instructions)
                    .ok_or_else(|| WeftError::Validation(format!(
                        "Executor '{}' has no agent profile",
                        name
                    )))?;
                let handle = self.provider.get_or_create_agent(&profile)?;
                Ok(Executor::Agent(AgentExecutor::new(
                    name.clone(),
                    handle,
                    self.limiter.clone(),
                )))
            }
            ExecutorSpec::Function {
                name,
                function_name,
                parameters,
            } => {
                if !self.registry.contains(function_name) {
                    return Err(WeftError::Validation(format!(
                        "Executor '{}' references unknown function '{}'",
                        name, function_name
                    )));
                }
                Ok(Executor::Function(FunctionExecutor::new(
                    name.clone(),
                    function_name.clone(),
                    parameters.clone().unwrap_or_default(),
                    self.registry.clone(),
                    self.working_dir.clone(),
                )))
            }
        }
    }
}
