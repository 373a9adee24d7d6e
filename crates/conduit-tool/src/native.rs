//! Tools executed by the provider itself

use async_trait::async_trait;
use conduit_model::ConversationRequest;
use conduit_model::NativeTool as NativeDeclaration;

use crate::error::ToolError;
use crate::tool::{RequestProcessor, Tool, ToolContext};

/// Provider-side tool, offered through the generation config
///
/// It has no declaration and never runs locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeTool {
    kind: NativeDeclaration,
    description: &'static str,
}

impl NativeTool {
    pub const fn new(kind: NativeDeclaration, description: &'static str) -> Self {
        Self { kind, description }
    }

    /// Web search performed by the model provider
    pub const fn google_search() -> Self {
        Self::new(
            NativeDeclaration::GoogleSearch,
            "Performs a Google search to retrieve information from the web.",
        )
    }

    /// Code execution sandbox run by the model provider
    pub const fn code_execution() -> Self {
        Self::new(
            NativeDeclaration::CodeExecution,
            "Executes code generated by the model and returns the result.",
        )
    }

    pub const fn kind(&self) -> NativeDeclaration {
        self.kind
    }
}

impl Tool for NativeTool {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn description(&self) -> &str {
        self.description
    }

    fn as_request_processor(&self) -> Option<&dyn RequestProcessor> {
        Some(self)
    }
}

#[async_trait]
impl RequestProcessor for NativeTool {
    async fn process_request(&self, _ctx: &ToolContext, request: &mut ConversationRequest) -> Result<(), ToolError> {
        request.config.tools.push(self.kind);
        Ok(())
    }
}
