use thiserror::Error;

use crate::session::SessionId;

/// Failures produced while resolving, validating or running a tool.
///
/// These never unwind past the tool registry: every one of them is turned
/// into either a JSON-RPC error or an `isError` tool result before it reaches
/// the session stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Command timed out after {timeout_ms}ms")]
    CommandTimeout { timeout_ms: u64 },

    #[error("Failed to spawn command: {0}")]
    CommandSpawnFailure(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Tool handler failed: {0}")]
    HandlerFailed(String),
}

impl ToolError {
    /// Errors caused by the request itself rather than by running it.
    pub fn is_request_error(&self) -> bool {
        matches!(self, ToolError::NotFound(_) | ToolError::InvalidArguments(_))
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    #[error("Session stream closed")]
    StreamClosed,
}
