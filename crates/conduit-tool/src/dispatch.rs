//! Tool registry and dispatch
//!
//! [`ToolDispatcher`] holds the tools and toolsets available to an agent. For
//! each outgoing request it resolves the active tools, lets each one
//! contribute to the request in registration order, and later routes the
//! model's function calls back to the matching tool.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_model::{ConversationRequest, FunctionCall, FunctionResponse, Part, Turn};
use futures_util::future::join_all;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::tool::{Tool, ToolContext, pack_tool};

/// Decides whether a tool is exposed to the model
pub type Predicate = Arc<dyn Fn(&dyn Tool) -> bool + Send + Sync>;

/// Allow-list predicate matching tool names exactly
pub fn string_predicate<I, S>(names: I) -> Predicate
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let allowed: HashSet<String> = names.into_iter().map(Into::into).collect();
    Arc::new(move |tool: &dyn Tool| allowed.contains(tool.name()))
}

/// A group of tools resolved per invocation
#[async_trait]
pub trait Toolset: Send + Sync {
    fn name(&self) -> &str;

    async fn tools(&self, ctx: &ToolContext) -> Result<Vec<Arc<dyn Tool>>, ToolError>;
}

#[derive(Clone)]
enum Entry {
    Tool(Arc<dyn Tool>),
    Toolset(Arc<dyn Toolset>),
}

/// Ordered collection of tools and toolsets
#[derive(Clone, Default)]
pub struct ToolDispatcher {
    entries: Vec<Entry>,
    predicate: Option<Predicate>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.entries.push(Entry::Tool(Arc::new(tool)));
        self
    }

    #[must_use]
    pub fn with_shared_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.entries.push(Entry::Tool(tool));
        self
    }

    #[must_use]
    pub fn with_toolset(mut self, toolset: impl Toolset + 'static) -> Self {
        self.entries.push(Entry::Toolset(Arc::new(toolset)));
        self
    }

    /// Only expose tools accepted by `predicate`
    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Active tools in registration order, toolsets expanded in place
    pub async fn tools(&self, ctx: &ToolContext) -> Result<Vec<Arc<dyn Tool>>, ToolError> {
        let mut tools = Vec::new();

        for entry in &self.entries {
            match entry {
                Entry::Tool(tool) => tools.push(Arc::clone(tool)),
                Entry::Toolset(toolset) => {
                    let resolved = toolset.tools(ctx).await?;
                    tracing::debug!(toolset = %toolset.name(), count = resolved.len(), "resolved toolset");
                    tools.extend(resolved);
                }
            }
        }

        if let Some(predicate) = &self.predicate {
            tools.retain(|tool| predicate(tool.as_ref()));
        }

        Ok(tools)
    }

    /// Let every active tool contribute to the request
    ///
    /// Tools without a request processor have their declaration packed.
    pub async fn process_request(&self, ctx: &ToolContext, request: &mut ConversationRequest) -> Result<(), ToolError> {
        for tool in self.tools(ctx).await? {
            match tool.as_request_processor() {
                Some(processor) => processor.process_request(ctx, request).await?,
                None => pack_tool(request, tool.as_ref())?,
            }
        }

        Ok(())
    }

    /// Run one function call and wrap its result as a function-result part
    pub async fn execute(&self, ctx: &ToolContext, call: &FunctionCall) -> Result<Part, ToolError> {
        let tools = self.tools(ctx).await?;
        execute_with(&tools, ctx, call).await
    }

    /// Run every call concurrently and fold the results into one user turn
    ///
    /// Results keep the order of `calls`. A failed call answers with
    /// `{"error": "<message>"}` so the model can see what went wrong.
    pub async fn execute_calls(&self, ctx: &ToolContext, calls: &[FunctionCall]) -> Result<Turn, ToolError> {
        let tools = self.tools(ctx).await?;

        let results = join_all(calls.iter().map(|call| {
            let tools = &tools;
            async move {
                match execute_with(tools, ctx, call).await {
                    Ok(part) => part,
                    Err(e) => {
                        tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                        let response = Map::from_iter([("error".to_owned(), Value::String(e.to_string()))]);
                        Part::FunctionResponse(FunctionResponse::for_call(call, response))
                    }
                }
            }
        }))
        .await;

        Ok(Turn::user(results))
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("entries", &self.entries.len())
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

async fn execute_with(tools: &[Arc<dyn Tool>], ctx: &ToolContext, call: &FunctionCall) -> Result<Part, ToolError> {
    let tool = tools
        .iter()
        .find(|tool| tool.name() == call.name)
        .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

    let runnable = tool
        .as_runnable()
        .ok_or_else(|| ToolError::NotRunnable(call.name.clone()))?;

    let ctx = ctx.clone().with_function_call_id(call.id.clone());
    let cancel = ctx.cancellation_token().clone();

    tracing::debug!(tool = %call.name, call_id = ?call.id, "executing tool call");

    let response = tokio::select! {
        () = cancel.cancelled() => return Err(ToolError::Cancelled),
        result = runnable.run(&ctx, call.args.clone()) => result?,
    };

    Ok(Part::FunctionResponse(FunctionResponse::for_call(call, response)))
}
