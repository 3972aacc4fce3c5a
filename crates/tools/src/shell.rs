//! Command tool — run a shell command in the workspace.
//!
//! The command runs with the workspace root as its working directory and is
//! killed when it outlives its timeout or the call is cancelled.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tinyreact_core::error::ToolError;
use tinyreact_core::tool::{CallContext, ParamSpec, ParamType, Tool, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::workspace::Workspace;

/// Output beyond this many bytes is cut off.
const MAX_OUTPUT_BYTES: usize = 10_000;

pub struct ShellTool {
    workspace: Workspace,
    default_timeout_secs: u64,
}

impl ShellTool {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            default_timeout_secs: 60,
        }
    }

    pub fn with_default_timeout(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs.max(1);
        self
    }
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_OUTPUT_BYTES {
        let total = text.len();
        let mut cut = MAX_OUTPUT_BYTES;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str(&format!("\n... [output truncated, {total} bytes total]"));
    }
    text
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the working directory and return its stdout and stderr."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("command", ParamType::String, "The shell command to execute"),
            ParamSpec::optional(
                "timeout_secs",
                ParamType::Integer,
                "Seconds before the command is killed",
                None,
            ),
        ]
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &CallContext,
    ) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;
        let timeout_secs = arguments["timeout_secs"]
            .as_u64()
            .unwrap_or(self.default_timeout_secs)
            .max(1);

        debug!(command = %command, cwd = %self.workspace.root().display(), "Executing command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        let child = cmd
            .current_dir(self.workspace.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::failed("execute_command", e.to_string()))?;

        let output = tokio::select! {
            out = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()) => {
                match out {
                    Ok(result) => result.map_err(|e| ToolError::failed("execute_command", e.to_string()))?,
                    Err(_) => {
                        warn!(command = %command, timeout_secs, "Command timed out");
                        return Err(ToolError::failed(
                            "execute_command",
                            format!("Command timed out after {timeout_secs}s"),
                        ));
                    }
                }
            }
            _ = ctx.cancel.cancelled() => {
                return Err(ToolError::failed("execute_command", "Command cancelled"));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = output.status.code().unwrap_or(-1);
        let success = output.status.success();

        let text = if success {
            if stderr.trim().is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            }
        } else {
            warn!(command = %command, exit_code = code, "Command failed");
            format!("[exit code: {code}]\n{stdout}\n{stderr}")
        };

        Ok(ToolResult {
            success,
            output: truncate(text.trim().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_in(dir: &std::path::Path) -> ShellTool {
        ShellTool::new(Workspace::new(dir))
    }

    #[tokio::test]
    async fn execute_echo() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool_in(dir.path())
            .execute(serde_json::json!({"command": "echo hello"}), &CallContext::root(1))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_workspace_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let result = tool_in(dir.path())
            .execute(serde_json::json!({"command": "ls"}), &CallContext::root(1))
            .await
            .unwrap();
        assert!(result.output.contains("marker.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_reported_in_output() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool_in(dir.path())
            .execute(serde_json::json!({"command": "echo oops >&2; exit 2"}), &CallContext::root(1))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("[exit code: 2]"));
        assert!(result.output.contains("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_command() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool_in(dir.path())
            .execute(
                serde_json::json!({"command": "sleep 5", "timeout_secs": 1}),
                &CallContext::root(1),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_stops_command() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CallContext::root(1);
        ctx.cancel.cancel();
        let err = tool_in(dir.path())
            .execute(serde_json::json!({"command": "sleep 5"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn long_output_truncated() {
        let text = truncate("y".repeat(MAX_OUTPUT_BYTES * 2));
        assert!(text.len() < MAX_OUTPUT_BYTES + 100);
        assert!(text.contains("truncated"));
    }
}
