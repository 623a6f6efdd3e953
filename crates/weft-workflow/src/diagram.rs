use weft_core::workflow::{EdgeKind, ExecutorSpec, WorkflowSpec};

/// Render a workflow spec as a Mermaid `graph TD` diagram.
///
/// Purely derived from the definition; has no effect on execution.
pub fn workflow_to_mermaid(spec: &WorkflowSpec) -> String {
    let mut lines = vec!["graph TD".to_string()];

    for executor in &spec.executors {
        let node_id = sanitize(executor.name());
        let mut label = format!("{} ({})", executor.name(), executor.kind());

        if let ExecutorSpec::Agent {
            tools: Some(tools), ..
        } = executor
        {
            if !tools.is_empty() {
                let mut shown: Vec<&str> = tools.iter().take(3).map(String::as_str).collect();
                if tools.len() > 3 {
                    shown.push("...");
                }
                label.push_str(&format!("<br/><small>{}</small>", shown.join(", ")));
            }
        }

        lines.push(format!("    {}[\"{}\"]", node_id, escape(&label)));
    }

    for edge in &spec.edges {
        let from = sanitize(&edge.from_executor);
        let to = sanitize(&edge.to_executor);
        let arrow = match edge.edge_type {
            EdgeKind::Direct => "-->",
            EdgeKind::Conditional => "-.->",
            EdgeKind::FanOut | EdgeKind::FanIn => "==>",
        };

        let label = match &edge.condition {
            Some(cond) => {
                let op = serde_json::to_value(cond.operator)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                format!("|\"{} {} {}\"|", escape(&cond.field), op, cond.value)
            }
            None => String::new(),
        };

        lines.push(format!("    {} {}{} {}", from, arrow, label, to));
    }

    // Highlight the start executor
    lines.push(format!(
        "    style {} fill:#90EE90,stroke:#333,stroke-width:3px",
        sanitize(&spec.start_executor)
    ));

    lines.join("\n")
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn escape(label: &str) -> String {
    label.replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::workflow::{
        ConditionOperator, EdgeCondition, EdgeSpec, WorkflowKind,
    };

    fn sample_spec() -> WorkflowSpec {
        WorkflowSpec {
            name: "data-processing".into(),
            description: None,
            executors: vec![
                ExecutorSpec::Agent {
                    name: "data-analyzer".into(),
                    agent_name: None,
                    agent_id: None,
                    instructions: None,
                    tools: Some(vec!["execute_command".into()]),
                },
                ExecutorSpec::Function {
                    name: "formatter".into(),
                    function_name: "execute_command".into(),
                    parameters: None,
                },
            ],
            edges: vec![EdgeSpec {
                from_executor: "data-analyzer".into(),
                to_executor: "formatter".into(),
                edge_type: EdgeKind::Direct,
                condition: None,
            }],
            start_executor: "data-analyzer".into(),
            workflow_type: WorkflowKind::Sequential,
        }
    }

    #[test]
    fn test_mermaid_structure() {
        let diagram = workflow_to_mermaid(&sample_spec());
        assert!(diagram.starts_with("graph TD"));
        assert!(diagram.contains("data_analyzer[\"data-analyzer (agent)"));
        assert!(diagram.contains("formatter[\"formatter (function)\"]"));
        assert!(diagram.contains("data_analyzer --> formatter"));
        assert!(diagram.contains("style data_analyzer"));
    }

    #[test]
    fn test_conditional_edge_styling_and_label() {
        let mut spec = sample_spec();
        spec.edges[0].edge_type = EdgeKind::Conditional;
        spec.edges[0].condition = Some(EdgeCondition {
            field: "status".into(),
            operator: ConditionOperator::Equals,
            value: serde_json::json!("ok"),
        });

        let diagram = workflow_to_mermaid(&spec);
        assert!(diagram.contains("-.->"));
        assert!(diagram.contains("status equals"));
    }

    #[test]
    fn test_tool_list_truncated_in_label() {
        let mut spec = sample_spec();
        spec.executors[0] = ExecutorSpec::Agent {
            name: "a".into(),
            agent_name: None,
            agent_id: None,
            instructions: None,
            tools: Some(vec!["t1".into(), "t2".into(), "t3".into(), "t4".into()]),
        };
        let diagram = workflow_to_mermaid(&spec);
        assert!(diagram.contains("t1, t2, t3, ..."));
        assert!(!diagram.contains("t4"));
    }
}
