//! Remote MCP tools exposed through the local tool traits

use std::sync::Arc;

use async_trait::async_trait;
use conduit_model::ToolDeclaration;
use conduit_tool::{Declarable, Runnable, Tool, ToolContext, ToolError};
use serde_json::{Map, Value};

use crate::error::McpError;
use crate::session::{RemoteCallResult, RemoteToolSpec, SessionProvider};

const OUTPUT_KEY: &str = "output";

/// A tool served by a remote MCP server
pub struct McpTool {
    spec: RemoteToolSpec,
    sessions: Arc<dyn SessionProvider>,
}

impl McpTool {
    pub fn new(spec: RemoteToolSpec, sessions: Arc<dyn SessionProvider>) -> Self {
        Self { spec, sessions }
    }

    async fn call(&self, args: Map<String, Value>) -> Result<Map<String, Value>, McpError> {
        let session = self.sessions.session().await?;

        let result = match session.call_tool(&self.spec.name, args).await {
            Ok(result) => result,
            Err(e) => {
                if e.is_transport() {
                    self.sessions.invalidate().await;
                }
                return Err(e);
            }
        };

        into_output(result)
    }
}

impl std::fmt::Debug for McpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpTool")
            .field("name", &self.spec.name)
            .finish_non_exhaustive()
    }
}

/// Map a call result onto the tool output contract
///
/// Structured output wins over text. A non-error result with neither is an
/// error rather than an empty mapping.
fn into_output(result: RemoteCallResult) -> Result<Map<String, Value>, McpError> {
    if result.is_error {
        let details = result.text();
        let mut message = "Tool execution failed.".to_owned();
        if !details.is_empty() {
            message.push_str(" Details: ");
            message.push_str(&details);
        }
        return Err(McpError::Execution(message));
    }

    let output = match result.structured {
        Some(structured) => structured,
        None => {
            let text = result.text();
            if text.is_empty() {
                return Err(McpError::EmptyResponse);
            }
            Value::String(text)
        }
    };

    Ok(Map::from_iter([(OUTPUT_KEY.to_owned(), output)]))
}

impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn as_declarable(&self) -> Option<&dyn Declarable> {
        Some(self)
    }

    fn as_runnable(&self) -> Option<&dyn Runnable> {
        Some(self)
    }
}

impl Declarable for McpTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.spec.name.clone(),
            description: self.spec.description.clone(),
            parameters: self.spec.input_schema.clone(),
            response: self.spec.output_schema.clone(),
            long_running: false,
        }
    }
}

#[async_trait]
impl Runnable for McpTool {
    async fn run(&self, _ctx: &ToolContext, args: Map<String, Value>) -> Result<Map<String, Value>, ToolError> {
        self.call(args).await.map_err(|e| {
            tracing::warn!(tool = %self.spec.name, error = %e, "MCP tool call failed");
            ToolError::from(e)
        })
    }
}
