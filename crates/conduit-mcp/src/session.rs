//! Remote session seam
//!
//! Tools never hold a connection themselves. They ask a [`SessionProvider`]
//! for a session on every call, and the provider decides whether to reuse
//! or open one.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::McpError;

/// Tool advertised by a remote server
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Option<Value>,
}

/// One content block of a call result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteContent {
    Text(String),
    /// Images, audio, resources and links; not forwarded to the model
    Other,
}

/// Outcome of a remote tool call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteCallResult {
    pub is_error: bool,
    pub content: Vec<RemoteContent>,
    pub structured: Option<Value>,
}

impl RemoteCallResult {
    /// Concatenation of every text block
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|content| match content {
                RemoteContent::Text(text) => Some(text.as_str()),
                RemoteContent::Other => None,
            })
            .collect()
    }
}

/// An open connection to a tool server
#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>, McpError>;

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<RemoteCallResult, McpError>;
}

/// Hands out sessions on demand
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Session to use for the next operation
    async fn session(&self) -> Result<Arc<dyn RemoteSession>, McpError>;

    /// Forget a session that failed at the transport level
    async fn invalidate(&self) {}
}
