//! Built-in tool implementations for tinyreact.
//!
//! Tools give the agent the ability to interact with the world: read and
//! write files, run commands and do arithmetic. File and command tools are
//! confined to one working directory.

pub mod calculator;
pub mod file_read;
pub mod file_write;
pub mod shell;
pub mod workspace;

use std::path::Path;
use std::sync::Arc;
use tinyreact_core::tool::ToolRegistry;

pub use calculator::CalculatorTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use shell::ShellTool;
pub use workspace::Workspace;

/// Create a registry with all built-in tools, confined to `work_dir`.
pub fn default_registry(work_dir: &Path) -> ToolRegistry {
    let workspace = Workspace::new(work_dir);
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FileReadTool::new(workspace.clone())));
    registry.register(Arc::new(FileWriteTool::new(workspace.clone())));
    registry.register(Arc::new(ShellTool::new(workspace)));
    registry.register(Arc::new(CalculatorTool));
    registry
}
