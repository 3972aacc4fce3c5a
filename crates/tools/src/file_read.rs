//! File read tool — read a text file inside the workspace.

use async_trait::async_trait;
use tinyreact_core::error::ToolError;
use tinyreact_core::tool::{CallContext, ParamSpec, ParamType, Tool, ToolResult};

use crate::workspace::Workspace;

/// Largest file returned in full; longer files are truncated.
const MAX_READ_BYTES: usize = 100_000;

pub struct FileReadTool {
    workspace: Workspace,
}

impl FileReadTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. Paths are relative to the working directory."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("path", ParamType::String, "The file path to read")]
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &CallContext,
    ) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = self
            .workspace
            .resolve(path)
            .map_err(|e| ToolError::failed("read_file", e))?;

        let mut content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::failed("read_file", format!("Failed to read {path}: {e}")))?;

        let total = content.len();
        if total > MAX_READ_BYTES {
            let mut cut = MAX_READ_BYTES;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content.truncate(cut);
            content.push_str(&format!("\n... [truncated, {total} bytes total]"));
        }

        Ok(ToolResult::ok(content))
    }
}
