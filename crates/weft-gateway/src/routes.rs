use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use weft_core::error::WeftError;
use weft_core::step::ExecutionStep;
use weft_core::types::new_trace_id;
use weft_core::workflow::WorkflowSpec;
use weft_workflow::{workflow_to_mermaid, RunError, RunOutcome};

use crate::state::AppState;

// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Weft workflow orchestration API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Workflow execution ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    pub workflow: WorkflowSpec,
    pub input_message: String,
    #[serde(default)]
    pub streaming: bool,
}

#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub output: String,
    pub trace_id: String,
    pub execution_steps: Vec<ExecutionStep>,
    pub workflow_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl From<RunOutcome> for WorkflowResponse {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            output: outcome.output,
            trace_id: outcome.trace_id,
            execution_steps: outcome.steps,
            workflow_id: outcome.workflow_id,
            error: outcome.error,
        }
    }
}

/// POST /api/workflow — build and execute a workflow once.
///
/// With `streaming: true` the response is an SSE stream of `step` events,
/// terminated by a `result` event carrying the output and overall status.
/// Either way the caller receives the full execution step log, success or
/// failure.
pub async fn execute_workflow(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WorkflowRequest>,
) -> Response {
    info!(
        workflow = %request.workflow.name,
        streaming = request.streaming,
        "Workflow execution requested"
    );

    if request.streaming {
        stream_workflow(state, request).into_response()
    } else {
        run_workflow(state, request).await.into_response()
    }
}

async fn run_workflow(state: Arc<AppState>, request: WorkflowRequest) -> Response {
    let cancel = state.shutdown.child_token();
    let outcome = state
        .workflows
        .execute(&request.workflow, &request.input_message, None, cancel)
        .await;

    let status = status_for(&outcome, &state).await;
    (status, Json(WorkflowResponse::from(outcome))).into_response()
}

fn stream_workflow(state: Arc<AppState>, request: WorkflowRequest) -> impl IntoResponse {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<ExecutionStep>();
    let cancel = state.shutdown.child_token();

    let run = tokio::spawn(async move {
        let outcome = state
            .workflows
            .execute(&request.workflow, &request.input_message, Some(tx), cancel)
            .await;
        if let Some(ref error) = outcome.error {
            if error.is_rate_limit() {
                state.limiter.record_error().await;
            }
        }
        outcome
    });

    let steps = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|step| (step, rx))
    })
    .map(|step| Event::default().event("step").json_data(&step));

    let result = futures::stream::once(async move {
        let payload = match run.await {
            Ok(outcome) => serde_json::json!({
                "status": if outcome.succeeded() { "completed" } else { "failed" },
                "output": outcome.output,
                "trace_id": outcome.trace_id,
                "workflow_id": outcome.workflow_id,
                "error": outcome.error,
            }),
            Err(e) => serde_json::json!({
                "status": "failed",
                "error": { "kind": "internal", "message": e.to_string() },
            }),
        };
        Event::default().event("result").json_data(&payload)
    });

    Sse::new(steps.chain(result)).keep_alive(KeepAlive::default())
}

/// HTTP status for a finished run. Provider rate limits are reported back to
/// the limiter so subsequent calls space out further.
async fn status_for(outcome: &RunOutcome, state: &AppState) -> StatusCode {
    match &outcome.error {
        None => StatusCode::OK,
        Some(error) if error.is_validation() => StatusCode::BAD_REQUEST,
        Some(error) if error.is_rate_limit() => {
            state.limiter.record_error().await;
            StatusCode::TOO_MANY_REQUESTS
        }
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ── Workflow visualization ──────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DiagramResponse {
    pub diagram: String,
}

/// POST /api/workflow/diagram — render a workflow spec as a Mermaid diagram.
pub async fn workflow_diagram(Json(spec): Json<WorkflowSpec>) -> Json<DiagramResponse> {
    Json(DiagramResponse {
        diagram: workflow_to_mermaid(&spec),
    })
}

// ── Single-agent messages ───────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub response: String,
    pub trace_id: String,
}

/// POST /api/agent/message — run a one-off agent message.
pub async fn agent_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MessageRequest>,
) -> Response {
    if request.message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "detail": "message must not be empty" })),
        )
            .into_response();
    }

    let trace_id = new_trace_id();
    info!(trace_id = %trace_id, "Agent message requested");

    match state
        .agents
        .run_message(
            request.message,
            request.name,
            request.id,
            request.instructions,
        )
        .await
    {
        Ok(response) => Json(MessageResponse { response, trace_id }).into_response(),
        Err(WeftError::RateLimitExceeded(detail)) => {
            state.limiter.record_error().await;
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "detail": "Rate limit exceeded. Please try again in a few moments.",
                    "provider_detail": detail,
                })),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": e.to_string(), "trace_id": trace_id })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_request_parse() {
        let json = r#"{
            "workflow": {
                "name": "demo",
                "executors": [{"type": "agent", "name": "a"}],
                "edges": [],
                "start_executor": "a"
            },
            "input_message": "hello"
        }"#;
        let request: WorkflowRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.workflow.name, "demo");
        assert!(!request.streaming);
    }

    #[test]
    fn test_workflow_response_omits_error_on_success() {
        let response = WorkflowResponse {
            output: "done".into(),
            trace_id: "t".into(),
            execution_steps: vec![],
            workflow_id: "w".into(),
            error: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["output"], "done");
    }
}
