use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use weft_core::config::AppConfig;
use weft_core::error::WeftError;
use weft_core::step::ExecutionStep;
use weft_core::traits::AgentProvider;
use weft_core::types::new_trace_id;
use weft_core::workflow::WorkflowSpec;
use weft_llm::RateLimiter;
use weft_tools::ToolRegistry;

use crate::builder::WorkflowBuilder;
use crate::log::StepLog;
use crate::runner::run_graph;

/// Error surfaced from a run, in caller-facing form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub kind: String,
    pub message: String,
}

impl RunError {
    fn from_weft(e: &WeftError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind == "validation_error"
    }

    pub fn is_rate_limit(&self) -> bool {
        self.kind == "rate_limit_exceeded"
    }
}

/// What one execution produced. The step log is always populated, success or
/// not; `output` is empty unless the run completed.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub output: String,
    pub trace_id: String,
    pub workflow_id: String,
    pub steps: Vec<ExecutionStep>,
    pub error: Option<RunError>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Builds and executes dynamic workflows.
///
/// One service instance lives for the whole process; each `execute` call owns
/// its graph and step log, while the agent cache and rate limiter behind the
/// injected provider are shared across runs.
pub struct WorkflowService {
    builder: WorkflowBuilder,
    max_node_visits: usize,
}

impl WorkflowService {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn AgentProvider>,
        registry: Arc<ToolRegistry>,
        limiter: Arc<RateLimiter>,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            builder: WorkflowBuilder::new(
                provider,
                registry,
                limiter,
                config.agent.default_instructions.clone(),
                working_dir,
            ),
            max_node_visits: config.workflow.max_node_visits,
        }
    }

    /// Build the graph and run it once against `input_message`.
    ///
    /// With `events` attached, every step is forwarded as it is appended
    /// (streaming mode); the returned outcome is identical either way.
    pub async fn execute(
        &self,
        spec: &WorkflowSpec,
        input_message: &str,
        events: Option<UnboundedSender<ExecutionStep>>,
        cancel: CancellationToken,
    ) -> RunOutcome {
        let trace_id = new_trace_id();
        info!(
            workflow = %spec.name,
            trace_id = %trace_id,
            executors = spec.executors.len(),
            edges = spec.edges.len(),
            "Workflow execution requested"
        );

        let mut log = StepLog::new(events);

        let graph = match self.builder.build(spec, &mut log) {
            Ok(graph) => graph,
            Err(e) => {
                // Validation failures abort before the run starts; no
                // execution step is recorded beyond the failed check.
                error!(workflow = %spec.name, trace_id = %trace_id, error = %e, "Workflow build failed");
                return RunOutcome {
                    output: String::new(),
                    trace_id,
                    workflow_id: spec.name.clone(),
                    steps: log.into_steps(),
                    error: Some(RunError::from_weft(&e)),
                };
            }
        };

        log.push(ExecutionStep::WorkflowExecutionStarted {
            input_length: input_message.len(),
        });

        let max_invocations = graph.executor_count().saturating_mul(self.max_node_visits);
        let result = run_graph(&graph, input_message, &mut log, &cancel, max_invocations).await;

        match result {
            Ok(output) => {
                log.push(ExecutionStep::WorkflowExecutionCompleted {
                    output_length: output.len(),
                });
                info!(
                    workflow = %spec.name,
                    trace_id = %trace_id,
                    output_length = output.len(),
                    "Workflow completed"
                );
                RunOutcome {
                    output,
                    trace_id,
                    workflow_id: spec.name.clone(),
                    steps: log.into_steps(),
                    error: None,
                }
            }
            Err(e) => {
                log.push(ExecutionStep::WorkflowExecutionFailed {
                    error: e.to_string(),
                    error_type: e.kind().to_string(),
                });
                error!(
                    workflow = %spec.name,
                    trace_id = %trace_id,
                    error = %e,
                    "Workflow failed"
                );
                RunOutcome {
                    output: String::new(),
                    trace_id,
                    workflow_id: spec.name.clone(),
                    steps: log.into_steps(),
                    error: Some(RunError::from_weft(&e)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use weft_core::config::AppConfig;
    use weft_core::error::Result;
    use weft_core::traits::{AgentHandle, Tool};
    use weft_core::types::{AgentProfile, ToolContext, ToolResult};
    use weft_core::workflow::{EdgeKind, EdgeSpec, ExecutorSpec, WorkflowKind};

    /// Records every (executor, input) invocation; output per agent name is
    /// scripted, defaulting to "<name>-out".
    struct ScriptedProvider {
        outputs: HashMap<String, std::result::Result<String, String>>,
        calls: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ScriptedProvider {
        fn new() -> Self {
            Self {
                outputs: HashMap::new(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn with_output(mut self, agent: &str, output: &str) -> Self {
            self.outputs.insert(agent.into(), Ok(output.into()));
            self
        }

        fn with_failure(mut self, agent: &str, error: &str) -> Self {
            self.outputs.insert(agent.into(), Err(error.into()));
            self
        }
    }

    struct ScriptedHandle {
        name: String,
        behavior: std::result::Result<String, String>,
        calls: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl AgentHandle for ScriptedHandle {
        fn run(&self, input: String) -> BoxFuture<'_, Result<String>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push((self.name.clone(), input));
                match &self.behavior {
                    Ok(output) => Ok(output.clone()),
                    Err(msg) => Err(WeftError::LlmRequest(msg.clone())),
                }
            })
        }
    }

    impl AgentProvider for ScriptedProvider {
        fn get_or_create_agent(
            &self,
            profile: &AgentProfile,
        ) -> Result<Arc<dyn AgentHandle>> {
            Ok(Arc::new(ScriptedHandle {
                name: profile.name.clone(),
                behavior: self
                    .outputs
                    .get(&profile.name)
                    .cloned()
                    .unwrap_or_else(|| Ok(format!("{}-out", profile.name))),
                calls: self.calls.clone(),
            }))
        }
    }

    /// Test tool: uppercases the propagated input.
    struct UppercaseTool;

    impl Tool for UppercaseTool {
        fn name(&self) -> &str {
            "uppercase"
        }
        fn description(&self) -> &str {
            "Uppercase the input"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        fn execute(
            &self,
            input: serde_json::Value,
            _ctx: ToolContext,
        ) -> BoxFuture<'_, Result<ToolResult>> {
            Box::pin(async move {
                let text = input["input"].as_str().unwrap_or_default();
                Ok(ToolResult::success(text.to_uppercase()))
            })
        }
    }

    fn agent(name: &str) -> ExecutorSpec {
        ExecutorSpec::Agent {
            name: name.into(),
            agent_name: None,
            agent_id: None,
            instructions: None,
            tools: None,
        }
    }

    fn edge(from: &str, to: &str) -> EdgeSpec {
        EdgeSpec {
            from_executor: from.into(),
            to_executor: to.into(),
            edge_type: EdgeKind::Direct,
            condition: None,
        }
    }

    fn spec(executors: Vec<ExecutorSpec>, edges: Vec<EdgeSpec>, start: &str) -> WorkflowSpec {
        WorkflowSpec {
            name: "test-workflow".into(),
            description: None,
            executors,
            edges,
            start_executor: start.into(),
            workflow_type: WorkflowKind::Sequential,
        }
    }

    fn service_with(provider: ScriptedProvider) -> (WorkflowService, Arc<Mutex<Vec<(String, String)>>>) {
        let calls = provider.calls.clone();
        let config = AppConfig::default();
        let mut registry = ToolRegistry::with_builtins();
        registry.register(UppercaseTool);
        let service = WorkflowService::new(
            &config,
            Arc::new(provider),
            Arc::new(registry),
            Arc::new(RateLimiter::new(&config.rate_limit)),
            PathBuf::from("."),
        );
        (service, calls)
    }

    async fn execute(service: &WorkflowService, spec: &WorkflowSpec, input: &str) -> RunOutcome {
        service
            .execute(spec, input, None, CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_two_node_chain_step_order_and_propagation() {
        let provider = ScriptedProvider::new().with_output("a", "X");
        let (service, calls) = service_with(provider);
        let spec = spec(vec![agent("a"), agent("b")], vec![edge("a", "b")], "a");

        let outcome = execute(&service, &spec, "start").await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.output, "b-out");
        assert_eq!(outcome.workflow_id, "test-workflow");
        assert!(!outcome.trace_id.is_empty());

        let tags: Vec<_> = outcome.steps.iter().map(|s| s.tag()).collect();
        assert_eq!(
            tags,
            vec![
                "executor_created",
                "executor_created",
                "edge_added",
                "workflow_built",
                "workflow_execution_started",
                "executor_start",
                "executor_success",
                "executor_start",
                "executor_success",
                "workflow_execution_completed",
            ]
        );

        // B was invoked with A's output
        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("a".to_string(), "start".to_string()),
                               ("b".to_string(), "X".to_string())]);
    }

    #[tokio::test]
    async fn test_duplicate_executor_name_rejected() {
        let (service, _) = service_with(ScriptedProvider::new());
        let spec = spec(vec![agent("a"), agent("a")], vec![], "a");

        let outcome = execute(&service, &spec, "go").await;
        let err = outcome.error.unwrap();
        assert!(err.is_validation());
        assert!(err.message.contains("Duplicate executor name"));
        assert!(outcome.steps.is_empty());
        assert!(outcome.output.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_start_executor_rejected() {
        let (service, _) = service_with(ScriptedProvider::new());
        let spec = spec(vec![agent("a")], vec![], "missing");

        let outcome = execute(&service, &spec, "go").await;
        let err = outcome.error.unwrap();
        assert!(err.is_validation());
        assert!(err.message.contains("missing"));
        assert!(outcome.steps.is_empty());
    }

    #[tokio::test]
    async fn test_edge_with_unknown_endpoint_rejected() {
        let (service, calls) = service_with(ScriptedProvider::new());
        let spec = spec(vec![agent("a")], vec![edge("a", "ghost")], "a");

        let outcome = execute(&service, &spec, "go").await;
        let err = outcome.error.unwrap();
        assert!(err.is_validation());
        assert!(err.message.contains("ghost"));
        // Build got through executor creation, then stopped at the bad edge
        let tags: Vec<_> = outcome.steps.iter().map(|s| s.tag()).collect();
        assert_eq!(tags, vec!["executor_created"]);
        assert!(calls.lock().unwrap().is_empty());
    }

    /// Provider that enforces the registered-tool table, like the real one.
    struct StrictProvider {
        known_tools: Vec<String>,
    }

    impl AgentProvider for StrictProvider {
        fn get_or_create_agent(
            &self,
            profile: &AgentProfile,
        ) -> Result<Arc<dyn AgentHandle>> {
            if let Some(tool) = profile.tools.iter().find(|t| !self.known_tools.contains(t)) {
                return Err(WeftError::Validation(format!(
                    "Agent '{}' requests unknown tool '{}'",
                    profile.name, tool
                )));
            }
            Ok(Arc::new(ScriptedHandle {
                name: profile.name.clone(),
                behavior: Ok("ok".into()),
                calls: Arc::new(Mutex::new(Vec::new())),
            }))
        }
    }

    #[tokio::test]
    async fn test_unknown_agent_tool_fails_build() {
        let config = AppConfig::default();
        let service = WorkflowService::new(
            &config,
            Arc::new(StrictProvider {
                known_tools: vec!["execute_command".into()],
            }),
            Arc::new(ToolRegistry::with_builtins()),
            Arc::new(RateLimiter::new(&config.rate_limit)),
            PathBuf::from("."),
        );
        let spec = spec(
            vec![ExecutorSpec::Agent {
                name: "a".into(),
                agent_name: None,
                agent_id: None,
                instructions: None,
                tools: Some(vec!["quantum_solver".into()]),
            }],
            vec![],
            "a",
        );

        let outcome = execute(&service, &spec, "go").await;
        let err = outcome.error.unwrap();
        assert!(err.is_validation());
        assert!(err.message.contains("quantum_solver"));
        assert!(outcome.steps.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_function_rejected() {
        let (service, _) = service_with(ScriptedProvider::new());
        let spec = spec(
            vec![ExecutorSpec::Function {
                name: "f".into(),
                function_name: "no_such_function".into(),
                parameters: None,
            }],
            vec![],
            "f",
        );

        let outcome = execute(&service, &spec, "go").await;
        let err = outcome.error.unwrap();
        assert!(err.is_validation());
        assert!(err.message.contains("no_such_function"));
    }

    #[tokio::test]
    async fn test_node_failure_aborts_run() {
        let provider = ScriptedProvider::new().with_failure("a", "provider exploded");
        let (service, calls) = service_with(provider);
        let spec = spec(
            vec![agent("a"), agent("b"), agent("c")],
            vec![edge("a", "b"), edge("b", "c")],
            "a",
        );

        let outcome = execute(&service, &spec, "go").await;

        assert!(outcome.output.is_empty());
        let err = outcome.error.unwrap();
        assert_eq!(err.kind, "agent_invocation_error");
        assert!(err.message.contains("provider exploded"));

        // B and C never ran
        let invoked: Vec<_> = calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(invoked, vec!["a"]);

        let tags: Vec<_> = outcome.steps.iter().map(|s| s.tag()).collect();
        assert_eq!(tags.last(), Some(&"workflow_execution_failed"));
        assert!(tags.contains(&"executor_error"));
        assert!(!tags.contains(&"workflow_execution_completed"));
    }

    #[tokio::test]
    async fn test_fan_out_runs_in_adjacency_order_last_terminal_wins() {
        let provider = ScriptedProvider::new().with_output("a", "seed");
        let (service, calls) = service_with(provider);
        let spec = spec(
            vec![agent("a"), agent("b"), agent("c")],
            vec![edge("a", "b"), edge("a", "c")],
            "a",
        );

        let outcome = execute(&service, &spec, "go").await;

        assert!(outcome.succeeded());
        // Both siblings got A's output, in declaration order
        let calls = calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("a".to_string(), "go".to_string()),
                ("b".to_string(), "seed".to_string()),
                ("c".to_string(), "seed".to_string()),
            ]
        );
        // c executed last among the terminals
        assert_eq!(outcome.output, "c-out");
    }

    #[tokio::test]
    async fn test_function_executor_in_chain() {
        let provider = ScriptedProvider::new().with_output("a", "hello");
        let (service, _) = service_with(provider);
        let spec = spec(
            vec![
                agent("a"),
                ExecutorSpec::Function {
                    name: "shout".into(),
                    function_name: "uppercase".into(),
                    parameters: None,
                },
            ],
            vec![edge("a", "shout")],
            "a",
        );

        let outcome = execute(&service, &spec, "go").await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.output, "HELLO");
    }

    #[tokio::test]
    async fn test_non_direct_edges_recorded_but_inert() {
        let provider = ScriptedProvider::new().with_output("a", "seed");
        let (service, calls) = service_with(provider);
        let mut workflow = spec(
            vec![agent("a"), agent("b")],
            vec![EdgeSpec {
                from_executor: "a".into(),
                to_executor: "b".into(),
                edge_type: EdgeKind::Conditional,
                condition: None,
            }],
            "a",
        );
        workflow.workflow_type = WorkflowKind::Conditional;

        let outcome = execute(&service, &workflow, "go").await;

        assert!(outcome.succeeded());
        // The conditional edge shows up in the log with its declared type
        let has_edge = outcome.steps.iter().any(|s| {
            matches!(s, ExecutionStep::EdgeAdded { kind: EdgeKind::Conditional, .. })
        });
        assert!(has_edge);
        // ...but b never executed: a is terminal for Direct traversal
        let invoked: Vec<_> = calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(invoked, vec!["a"]);
        assert_eq!(outcome.output, "seed");
    }

    #[tokio::test]
    async fn test_cancelled_before_start_returns_accumulated_steps() {
        let (service, calls) = service_with(ScriptedProvider::new());
        let spec = spec(vec![agent("a"), agent("b")], vec![edge("a", "b")], "a");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = service.execute(&spec, "go", None, cancel).await;

        let err = outcome.error.unwrap();
        assert_eq!(err.kind, "cancelled");
        assert!(calls.lock().unwrap().is_empty());

        // The build steps and the failure marker are still reported
        let tags: Vec<_> = outcome.steps.iter().map(|s| s.tag()).collect();
        assert!(tags.contains(&"workflow_built"));
        assert_eq!(tags.last(), Some(&"workflow_execution_failed"));
    }

    #[tokio::test]
    async fn test_self_loop_hits_traversal_limit() {
        let provider = ScriptedProvider::new().with_output("a", "again");
        let (service, _) = service_with(provider);
        let spec = spec(vec![agent("a")], vec![edge("a", "a")], "a");

        let outcome = execute(&service, &spec, "go").await;
        let err = outcome.error.unwrap();
        assert_eq!(err.kind, "traversal_limit_exceeded");
    }

    #[tokio::test]
    async fn test_streaming_forwards_steps_in_order() {
        let provider = ScriptedProvider::new().with_output("a", "X");
        let (service, _) = service_with(provider);
        let spec = spec(vec![agent("a")], vec![], "a");

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let outcome = service
            .execute(&spec, "go", Some(tx), CancellationToken::new())
            .await;

        let mut streamed = Vec::new();
        while let Ok(step) = rx.try_recv() {
            streamed.push(step.tag());
        }
        let logged: Vec<_> = outcome.steps.iter().map(|s| s.tag()).collect();
        assert_eq!(streamed, logged);
    }

    #[tokio::test]
    async fn test_single_node_workflow_output() {
        let provider = ScriptedProvider::new().with_output("solo", "answer");
        let (service, _) = service_with(provider);
        let spec = spec(vec![agent("solo")], vec![], "solo");

        let outcome = execute(&service, &spec, "question").await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.output, "answer");
    }
}
