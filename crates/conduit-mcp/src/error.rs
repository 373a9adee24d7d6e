use conduit_tool::ToolError;
use thiserror::Error;

/// MCP bridge errors
#[derive(Debug, Error)]
pub enum McpError {
    /// Requested server does not exist in configuration
    #[error("server not found: {server}")]
    ServerNotFound { server: String },

    /// Transport-level connection or communication error
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote tool reported a failure
    #[error("{0}")]
    Execution(String),

    /// A successful call returned neither structured nor text content
    #[error("no content in tool response")]
    EmptyResponse,
}

impl McpError {
    /// Whether the session that produced this error should be dropped
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<McpError> for ToolError {
    fn from(error: McpError) -> Self {
        Self::Remote(error.to_string())
    }
}
