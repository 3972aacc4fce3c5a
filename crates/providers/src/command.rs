//! Command provider — drives an LLM through a local CLI program.
//!
//! Vendor CLIs (and simple wrapper scripts) read a prompt on stdin and
//! print the answer on stdout. The conversation is flattened into a plain
//! transcript; the program's output is always treated as a final answer,
//! so this provider never requests tool calls.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tinyreact_core::error::ProviderError;
use tinyreact_core::message::{Message, Role};
use tinyreact_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Maximum bytes of stderr carried into an error message.
const MAX_STDERR: usize = 2_000;

#[derive(Debug, Clone)]
pub struct CommandProvider {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let name = std::path::Path::new(&program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("command")
            .to_string();
        Self {
            name,
            program,
            args,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Flatten a conversation into the transcript written to stdin.
    pub fn transcript(messages: &[Message]) -> String {
        let mut out = String::new();
        for m in messages {
            let label = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            out.push_str(&format!("[{label}]\n"));
            if !m.content.is_empty() {
                out.push_str(m.content.trim_end());
                out.push('\n');
            }
            for call in &m.tool_calls {
                out.push_str(&format!("-> {}({})\n", call.name, call.arguments));
            }
            out.push('\n');
        }
        out
    }
}

#[async_trait]
impl Provider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let transcript = Self::transcript(&request.messages);
        debug!(program = %self.program, bytes = transcript.len(), "Running command provider");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to start '{}': {e}", self.program))
            })?;

        // Feed stdin from a task so a chatty program cannot fill its stdout
        // pipe while we are still writing.
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(transcript.as_bytes()).await {
                    debug!(error = %e, "Command closed stdin early");
                }
            });
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!("'{}' exceeded {:?}", self.program, self.timeout))
            })?
            .map_err(|e| ProviderError::Network(format!("Failed to read command output: {e}")))?;

        if !output.status.success() {
            let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.len() > MAX_STDERR {
                let mut cut = MAX_STDERR;
                while !stderr.is_char_boundary(cut) {
                    cut -= 1;
                }
                stderr.truncate(cut);
            }
            warn!(program = %self.program, status = ?output.status.code(), "Command provider failed");
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: format!("'{}' exited with {}: {stderr}", self.program, output.status),
            });
        }

        let content = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(ProviderResponse {
            message: Message::assistant(content),
            usage: None,
            model: request.model,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(which(&self.program))
    }
}

/// Whether `program` resolves to an executable path.
fn which(program: &str) -> bool {
    let path = std::path::Path::new(program);
    if path.components().count() > 1 {
        return path.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
