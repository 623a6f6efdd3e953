use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use weft_core::error::{Result, WeftError};
use weft_core::traits::Tool;
use weft_core::types::{ToolContext, ToolResult};

/// Shell command execution, exposed both as an agent tool and as the
/// `execute_command` function for function executors.
pub struct ExecuteCommandTool;

#[derive(Deserialize)]
struct CommandInput {
    #[serde(default)]
    command: Option<String>,
    /// Message propagated from the upstream executor. Used as the command
    /// when `command` is absent.
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    working_directory: Option<String>,
    #[serde(default = "default_timeout")]
    timeout: u64,
}

fn default_timeout() -> u64 { 300 }

impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Use for file operations, git commands, builds, and any other CLI work."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "working_directory": {
                    "type": "string",
                    "description": "Directory to execute the command in (default: configured working directory)"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 300)",
                    "default": 300
                }
            },
            "required": ["command"]
        })
    }

    fn execute(
        &self,
        input: serde_json::Value,
        ctx: ToolContext,
    ) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let params: CommandInput = serde_json::from_value(input)
                .map_err(|e| WeftError::ToolValidation(e.to_string()))?;

            let command = params
                .command
                .or(params.input)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| {
                    WeftError::ToolValidation("execute_command: no command given".into())
                })?;

            let working_dir = params
                .working_directory
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|| ctx.working_dir.clone());

            debug!(command = %command, dir = %working_dir.display(), "Executing command");

            let timeout = std::time::Duration::from_secs(params.timeout);
            let result = tokio::time::timeout(timeout, async {
                tokio::process::Command::new("sh")
                    .arg("-c")
                    .arg(&command)
                    .current_dir(&working_dir)
                    .output()
                    .await
            })
            .await;

            match result {
                Ok(Ok(output)) => {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    let stderr = String::from_utf8_lossy(&output.stderr);

                    let mut content = String::new();
                    if !stdout.is_empty() {
                        content.push_str(&stdout);
                    }
                    if !stderr.is_empty() {
                        if !content.is_empty() {
                            content.push('\n');
                        }
                        content.push_str("STDERR:\n");
                        content.push_str(&stderr);
                    }

                    // Truncate if too long
                    if content.len() > 30000 {
                        content.truncate(30000);
                        content.push_str("\n... (output truncated)");
                    }

                    if content.is_empty() {
                        content = "(no output)".to_string();
                    }

                    if output.status.success() {
                        Ok(ToolResult::success(content))
                    } else {
                        let code = output.status.code().unwrap_or(-1);
                        Ok(ToolResult::error(format!("Exit code {}\n{}", code, content)))
                    }
                }
                Ok(Err(e)) => Err(WeftError::ToolExecution {
                    tool: "execute_command".to_string(),
                    message: e.to_string(),
                }),
                Err(_) => Err(WeftError::ToolTimeout {
                    tool: "execute_command".to_string(),
                    timeout_secs: params.timeout,
                }),
            }
        })
    }

    fn timeout_secs(&self) -> u64 {
        300
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolContext {
        ToolContext {
            working_dir: std::path::PathBuf::from("."),
        }
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let result = ExecuteCommandTool
            .execute(serde_json::json!({"command": "echo weft"}), ctx())
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content.trim(), "weft");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error_result() {
        let result = ExecuteCommandTool
            .execute(serde_json::json!({"command": "exit 3"}), ctx())
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("Exit code 3"));
    }

    #[tokio::test]
    async fn test_input_fallback_as_command() {
        let result = ExecuteCommandTool
            .execute(serde_json::json!({"input": "echo from-input"}), ctx())
            .await
            .unwrap();
        assert_eq!(result.content.trim(), "from-input");
    }

    #[tokio::test]
    async fn test_missing_command_rejected() {
        let err = ExecuteCommandTool
            .execute(serde_json::json!({}), ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, WeftError::ToolValidation(_)));
    }

    #[tokio::test]
    async fn test_working_directory_override() {
        let dir = tempfile::tempdir().unwrap();
        let result = ExecuteCommandTool
            .execute(
                serde_json::json!({
                    "command": "pwd",
                    "working_directory": dir.path().to_str().unwrap()
                }),
                ctx(),
            )
            .await
            .unwrap();
        assert!(result.content.trim().ends_with(
            dir.path().file_name().unwrap().to_str().unwrap()
        ));
    }
}
