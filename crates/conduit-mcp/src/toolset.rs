//! MCP servers as toolsets

use std::sync::Arc;

use async_trait::async_trait;
use conduit_config::McpConfig;
use conduit_tool::{Predicate, Tool, ToolContext, ToolError, Toolset, string_predicate};

use crate::client::RmcpSessionProvider;
use crate::error::McpError;
use crate::session::SessionProvider;
use crate::tool::McpTool;

/// Every tool advertised by one MCP server
pub struct McpToolset {
    name: String,
    sessions: Arc<dyn SessionProvider>,
    filter: Option<Predicate>,
}

impl McpToolset {
    pub fn new(name: impl Into<String>, sessions: Arc<dyn SessionProvider>) -> Self {
        Self {
            name: name.into(),
            sessions,
            filter: None,
        }
    }

    /// Toolset for a server declared under `[mcp.servers.<name>]`
    ///
    /// A non-empty `tool_filter` becomes an allow-list.
    pub fn from_config(config: &McpConfig, name: &str) -> Result<Self, McpError> {
        let server = config.servers.get(name).ok_or_else(|| McpError::ServerNotFound {
            server: name.to_owned(),
        })?;

        let sessions = Arc::new(RmcpSessionProvider::new(name, server.server_type.clone()));
        let toolset = Self::new(name, sessions);

        if server.tool_filter.is_empty() {
            Ok(toolset)
        } else {
            Ok(toolset.with_filter(string_predicate(server.tool_filter.iter().cloned())))
        }
    }

    /// One toolset per configured server, in configuration order
    pub fn all_from_config(config: &McpConfig) -> Result<Vec<Self>, McpError> {
        config
            .servers
            .keys()
            .map(|name| Self::from_config(config, name))
            .collect()
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl std::fmt::Debug for McpToolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpToolset")
            .field("name", &self.name)
            .field("filtered", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Toolset for McpToolset {
    fn name(&self) -> &str {
        &self.name
    }

    async fn tools(&self, _ctx: &ToolContext) -> Result<Vec<Arc<dyn Tool>>, ToolError> {
        let session = self.sessions.session().await?;

        let specs = match session.list_tools().await {
            Ok(specs) => specs,
            Err(e) => {
                if e.is_transport() {
                    self.sessions.invalidate().await;
                }
                return Err(e.into());
            }
        };

        let mut tools: Vec<Arc<dyn Tool>> = specs
            .into_iter()
            .map(|spec| Arc::new(McpTool::new(spec, Arc::clone(&self.sessions))) as Arc<dyn Tool>)
            .collect();

        if let Some(filter) = &self.filter {
            tools.retain(|tool| filter(tool.as_ref()));
        }

        tracing::debug!(server = %self.name, count = tools.len(), "listed MCP tools");

        Ok(tools)
    }
}
