use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use weft_core::error::{Result, WeftError};
use weft_core::step::ExecutionStep;

use crate::builder::ExecutableGraph;
use crate::log::StepLog;

/// Drive a built graph from its start executor to completion.
///
/// Traversal is depth-first over Direct edges: each node's output becomes the
/// input of every downstream node in adjacency-insertion order, and each
/// branch runs to completion before the next sibling starts. A node with no
/// outgoing Direct edges is terminal; the last-executed terminal's output is
/// the workflow result. The first node failure aborts the whole run.
///
/// Cancellation is honored at node boundaries only — an in-flight executor
/// call is never interrupted. `max_invocations` caps total node executions so
/// an accepted-but-cyclic graph cannot run forever.
pub async fn run_graph(
    graph: &ExecutableGraph,
    input_message: &str,
    log: &mut StepLog,
    cancel: &CancellationToken,
    max_invocations: usize,
) -> Result<String> {
    let mut stack: Vec<(String, String)> =
        vec![(graph.start().to_string(), input_message.to_string())];
    let mut final_output = String::new();
    let mut invocations = 0usize;

    while let Some((name, input)) = stack.pop() {
        if cancel.is_cancelled() {
            info!(executor = %name, "Cancellation requested, stopping at node boundary");
            return Err(WeftError::Cancelled);
        }

        invocations += 1;
        if invocations > max_invocations {
            return Err(WeftError::TraversalLimitExceeded(max_invocations));
        }

        let executor = graph.executor(&name).ok_or_else(|| {
            WeftError::Validation(format!("Executor '{}' not found in graph", name))
        })?;

        log.push(ExecutionStep::ExecutorStart {
            executor: name.clone(),
            input_length: input.len(),
        });

        let output = match executor.invoke(&input).await {
            Ok(output) => output,
            Err(e) => {
                error!(executor = %name, error = %e, "Executor failed, aborting run");
                log.push(ExecutionStep::ExecutorError {
                    executor: name.clone(),
                    error: e.to_string(),
                    error_type: e.kind().to_string(),
                });
                return Err(e);
            }
        };

        log.push(ExecutionStep::ExecutorSuccess {
            executor: name.clone(),
            output_length: output.len(),
        });

        let successors = graph.successors(&name);
        if successors.is_empty() {
            debug!(executor = %name, "Terminal node reached");
            final_output = output;
        } else {
            // Reverse push so the first declared successor runs first.
            for succ in successors.iter().rev() {
                stack.push((succ.clone(), output.clone()));
            }
        }
    }

    Ok(final_output)
}
