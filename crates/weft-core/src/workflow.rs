use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::AgentProfile;

/// Declarative description of one processing node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorSpec {
    Agent {
        /// Unique executor name within the workflow.
        name: String,
        /// Logical agent name. Defaults to `name`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_name: Option<String>,
        /// Agent id. Defaults to `name`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
        /// Instructions for the agent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instructions: Option<String>,
        /// Tool names to enable. Absent = all registered tools.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tools: Option<Vec<String>>,
    },
    Function {
        /// Unique executor name within the workflow.
        name: String,
        /// Registered function to invoke.
        function_name: String,
        /// Parameters passed to the function alongside the incoming message.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parameters: Option<HashMap<String, serde_json::Value>>,
    },
}

impl ExecutorSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Agent { name, .. } | Self::Function { name, .. } => name,
        }
    }

    pub fn kind(&self) -> ExecutorKind {
        match self {
            Self::Agent { .. } => ExecutorKind::Agent,
            Self::Function { .. } => ExecutorKind::Function,
        }
    }

    /// The agent cache key for an agent executor, with name/id/instruction
    /// defaulting applied. None for function executors.
    pub fn agent_profile(&self, default_instructions: &str) -> Option<AgentProfile> {
        match self {
            Self::Agent {
                name,
                agent_name,
                agent_id,
                instructions,
                tools,
            } => {
                let agent_name = agent_name.clone().unwrap_or_else(|| name.clone());
                Some(AgentProfile {
                    id: agent_id.clone().unwrap_or_else(|| agent_name.clone()),
                    name: agent_name,
                    instructions: instructions
                        .clone()
                        .unwrap_or_else(|| default_instructions.to_string()),
                    tools: tools.clone().unwrap_or_default(),
                })
            }
            Self::Function { .. } => None,
        }
    }
}

/// Executor variant tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    Agent,
    Function,
}

impl std::fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::Function => write!(f, "function"),
        }
    }
}

/// Edge variant. Only `Direct` edges carry executable transitions; the
/// remaining kinds are accepted and recorded but never evaluated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    #[default]
    Direct,
    Conditional,
    FanOut,
    FanIn,
}

/// Comparison operator for conditional edges. Carried as data only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
}

/// Condition attached to a conditional edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: serde_json::Value,
}

/// A directed connection between two executors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from_executor: String,
    pub to_executor: String,
    #[serde(default)]
    pub edge_type: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<EdgeCondition>,
}

/// Workflow shape hint. Informational — the runner always executes the
/// sequential Direct-edge traversal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    #[default]
    Sequential,
    Parallel,
    Conditional,
    Dynamic,
}

/// The full declarative graph, as supplied per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub executors: Vec<ExecutorSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    pub start_executor: String,
    #[serde(default)]
    pub workflow_type: WorkflowKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_spec_tagged_parse() {
        let json = r#"{
            "type": "agent",
            "name": "analyzer",
            "agent_name": "data-analyzer",
            "instructions": "Analyze the input data",
            "tools": ["execute_command"]
        }"#;
        let spec: ExecutorSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.name(), "analyzer");
        assert_eq!(spec.kind(), ExecutorKind::Agent);

        let json = r#"{
            "type": "function",
            "name": "runner",
            "function_name": "execute_command",
            "parameters": {"working_directory": "/tmp"}
        }"#;
        let spec: ExecutorSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.kind(), ExecutorKind::Function);
    }

    #[test]
    fn test_agent_profile_defaults() {
        let spec: ExecutorSpec = serde_json::from_str(
            r#"{"type": "agent", "name": "helper"}"#,
        )
        .unwrap();
        let profile = spec.agent_profile("You are a helpful assistant.").unwrap();
        assert_eq!(profile.name, "helper");
        assert_eq!(profile.id, "helper");
        assert_eq!(profile.instructions, "You are a helpful assistant.");
        assert!(profile.tools.is_empty());
    }

    #[test]
    fn test_agent_id_defaults_to_agent_name() {
        let spec: ExecutorSpec = serde_json::from_str(
            r#"{"type": "agent", "name": "a", "agent_name": "data-analyzer"}"#,
        )
        .unwrap();
        let profile = spec.agent_profile("x").unwrap();
        assert_eq!(profile.name, "data-analyzer");
        assert_eq!(profile.id, "data-analyzer");
    }

    #[test]
    fn test_edge_defaults_to_direct() {
        let edge: EdgeSpec = serde_json::from_str(
            r#"{"from_executor": "a", "to_executor": "b"}"#,
        )
        .unwrap();
        assert_eq!(edge.edge_type, EdgeKind::Direct);
        assert!(edge.condition.is_none());
    }

    #[test]
    fn test_workflow_spec_parse() {
        let json = r#"{
            "name": "data-processing",
            "executors": [
                {"type": "agent", "name": "analyzer"},
                {"type": "agent", "name": "formatter"}
            ],
            "edges": [
                {"from_executor": "analyzer", "to_executor": "formatter", "edge_type": "direct"}
            ],
            "start_executor": "analyzer",
            "workflow_type": "sequential"
        }"#;
        let spec: WorkflowSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.executors.len(), 2);
        assert_eq!(spec.edges.len(), 1);
        assert_eq!(spec.workflow_type, WorkflowKind::Sequential);
    }

    #[test]
    fn test_conditional_edge_condition_parse() {
        let edge: EdgeSpec = serde_json::from_str(
            r#"{
                "from_executor": "a",
                "to_executor": "b",
                "edge_type": "conditional",
                "condition": {"field": "status", "operator": "equals", "value": "ok"}
            }"#,
        )
        .unwrap();
        assert_eq!(edge.edge_type, EdgeKind::Conditional);
        let cond = edge.condition.unwrap();
        assert_eq!(cond.operator, ConditionOperator::Equals);
        assert_eq!(cond.value, serde_json::json!("ok"));
    }
}
