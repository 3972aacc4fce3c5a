//! Error types for the tinyreact domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use thiserror::Error;

/// The top-level error type for all tinyreact operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Persisted state errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures reported by an LLM provider.
///
/// Split into transient (worth retrying) and fatal classes by
/// [`ProviderError::is_transient`].
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether the failure is transient (5xx, rate limit, timeout, network).
    ///
    /// Everything else (4xx, auth, unknown model, malformed request or
    /// response) is fatal and must not be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::ApiError { status_code, .. } => *status_code >= 500,
            ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_)
            | ProviderError::Network(_) => true,
            ProviderError::AuthenticationFailed(_)
            | ProviderError::ModelNotFound(_)
            | ProviderError::InvalidRequest(_)
            | ProviderError::InvalidResponse(_)
            | ProviderError::NotConfigured(_) => false,
        }
    }
}

/// The kind of a [`ToolError`], rendered by name in observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolErrorKind {
    InvalidArguments,
    NotFound,
    ExecutionFailed,
    RecursionLimitExceeded,
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ToolErrorKind::InvalidArguments => "InvalidArguments",
            ToolErrorKind::NotFound => "NotFound",
            ToolErrorKind::ExecutionFailed => "ExecutionFailed",
            ToolErrorKind::RecursionLimitExceeded => "RecursionLimitExceeded",
        };
        f.write_str(s)
    }
}

/// Failures raised while resolving or running a tool.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool not found: {name} (available: {})", .available.join(", "))]
    NotFound { name: String, available: Vec<String> },

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Recursion limit exceeded: depth {depth} > max {max_depth}")]
    RecursionLimitExceeded { depth: u32, max_depth: u32 },
}

impl ToolError {
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::InvalidArguments(_) => ToolErrorKind::InvalidArguments,
            ToolError::NotFound { .. } => ToolErrorKind::NotFound,
            ToolError::ExecutionFailed { .. } => ToolErrorKind::ExecutionFailed,
            ToolError::RecursionLimitExceeded { .. } => ToolErrorKind::RecursionLimitExceeded,
        }
    }

    /// Only recursion-limit violations abort the agent loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ToolError::RecursionLimitExceeded { .. })
    }

    /// Shorthand for an `ExecutionFailed` error.
    pub fn failed(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reading or writing persisted agent state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted state for agent '{agent}': {reason}")]
    Corrupted { agent: String, reason: String },
}
