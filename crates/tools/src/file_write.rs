//! File write tool — create or overwrite a file inside the workspace.

use async_trait::async_trait;
use tinyreact_core::error::ToolError;
use tinyreact_core::tool::{CallContext, ParamSpec, ParamType, Tool, ToolResult};

use crate::workspace::Workspace;

pub struct FileWriteTool {
    workspace: Workspace,
}

impl FileWriteTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file and parent directories if needed, overwrites otherwise."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("path", ParamType::String, "The file path to write to"),
            ParamSpec::required("content", ParamType::String, "The content to write"),
            ParamSpec::optional(
                "append",
                ParamType::Boolean,
                "Append instead of overwriting",
                Some(serde_json::json!(false)),
            ),
        ]
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &CallContext,
    ) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;
        let append = arguments["append"].as_bool().unwrap_or(false);

        let resolved = self
            .workspace
            .resolve(path)
            .map_err(|e| ToolError::failed("write_file", e))?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ToolError::failed("write_file", format!("Failed to create directory: {e}"))
            })?;
        }

        let written = if append {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&resolved)
                .await
                .map_err(|e| ToolError::failed("write_file", format!("Failed to open {path}: {e}")))?;
            file.write_all(content.as_bytes()).await
        } else {
            tokio::fs::write(&resolved, content).await
        };
        written.map_err(|e| ToolError::failed("write_file", format!("Failed to write {path}: {e}")))?;

        Ok(ToolResult::ok(format!(
            "Successfully wrote {} bytes to {path}",
            content.len()
        )))
    }
}
