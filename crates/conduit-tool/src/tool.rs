//! Tool capabilities and request helpers
//!
//! A [`Tool`] names itself and optionally exposes any subset of three
//! capabilities. Dispatch code asks for a capability through the `as_*`
//! accessors instead of depending on concrete tool types.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_model::{ConversationRequest, Part, Role, ToolDeclaration, Turn};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::artifacts::ArtifactStore;
use crate::error::ToolError;

/// Appended to the description of long-running declarations
pub const LONG_RUNNING_NOTE: &str = "NOTE: This is a long-running operation. Do not call this tool again if it has \
                                     already returned some intermediate or pending status.";

/// A capability the model can be offered
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Result arrives later; the model must not re-invoke while pending
    fn is_long_running(&self) -> bool {
        false
    }

    fn as_declarable(&self) -> Option<&dyn Declarable> {
        None
    }

    fn as_runnable(&self) -> Option<&dyn Runnable> {
        None
    }

    fn as_request_processor(&self) -> Option<&dyn RequestProcessor> {
        None
    }
}

/// Exposes a schema-backed function signature
pub trait Declarable: Send + Sync {
    fn declaration(&self) -> ToolDeclaration;
}

/// Executes a call with untyped arguments
#[async_trait]
pub trait Runnable: Send + Sync {
    async fn run(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<Map<String, Value>, ToolError>;
}

/// Contributes to an outgoing request before it is sent
#[async_trait]
pub trait RequestProcessor: Send + Sync {
    async fn process_request(&self, ctx: &ToolContext, request: &mut ConversationRequest) -> Result<(), ToolError>;
}

/// Per-invocation state handed to tools
#[derive(Clone, Default)]
pub struct ToolContext {
    cancel: CancellationToken,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    function_call_id: Option<String>,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_artifacts(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(store);
        self
    }

    #[must_use]
    pub fn with_function_call_id(mut self, id: Option<String>) -> Self {
        self.function_call_id = id;
        self
    }

    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn artifacts(&self) -> Option<&Arc<dyn ArtifactStore>> {
        self.artifacts.as_ref()
    }

    /// Identifier of the call being executed, if the provider assigned one
    pub fn function_call_id(&self) -> Option<&str> {
        self.function_call_id.as_deref()
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("has_artifacts", &self.artifacts.is_some())
            .field("function_call_id", &self.function_call_id)
            .finish()
    }
}

/// Description with the long-running note applied
pub fn long_running_description(description: &str) -> String {
    if description.is_empty() {
        LONG_RUNNING_NOTE.to_owned()
    } else {
        format!("{description}\n\n{LONG_RUNNING_NOTE}")
    }
}

/// Add the tool's declaration to the request
///
/// Tools without a declaration are left out silently.
pub fn pack_tool(request: &mut ConversationRequest, tool: &dyn Tool) -> Result<(), ToolError> {
    let Some(declarable) = tool.as_declarable() else {
        return Ok(());
    };

    let declaration = declarable.declaration();
    if request.declaration(&declaration.name).is_some() {
        return Err(ToolError::DuplicateTool(declaration.name));
    }

    tracing::debug!(tool = %declaration.name, "declaring tool");
    request.tools.push(declaration);

    Ok(())
}

/// Append a text part to the system instruction, creating it if absent
pub fn append_instructions(request: &mut ConversationRequest, text: impl Into<String>) {
    let part = Part::text(text);

    match &mut request.config.system_instruction {
        Some(instruction) => instruction.parts.push(part),
        None => request.config.system_instruction = Some(Turn::new(Role::System, vec![part])),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Echo {
        long_running: bool,
    }

    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its input."
        }

        fn as_declarable(&self) -> Option<&dyn Declarable> {
            Some(self)
        }
    }

    impl Declarable for Echo {
        fn declaration(&self) -> ToolDeclaration {
            let description = if self.long_running {
                long_running_description(self.description())
            } else {
                self.description().to_owned()
            };

            ToolDeclaration {
                name: self.name().to_owned(),
                description,
                parameters: json!({"type": "object"}),
                response: None,
                long_running: self.long_running,
            }
        }
    }

    struct Silent;

    impl Tool for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        fn description(&self) -> &str {
            ""
        }
    }

    #[test]
    fn packing_twice_is_a_duplicate() {
        let mut request = ConversationRequest::default();
        let tool = Echo { long_running: false };

        pack_tool(&mut request, &tool).unwrap();
        let err = pack_tool(&mut request, &tool).unwrap_err();

        assert!(matches!(err, ToolError::DuplicateTool(ref name) if name == "echo"));
        assert_eq!(request.tools.len(), 1);
    }

    #[test]
    fn tools_without_declaration_are_not_packed() {
        let mut request = ConversationRequest::default();
        pack_tool(&mut request, &Silent).unwrap();
        assert!(request.tools.is_empty());
    }

    #[test]
    fn long_running_note_follows_description() {
        let mut request = ConversationRequest::default();
        pack_tool(&mut request, &Echo { long_running: true }).unwrap();

        let description = &request.tools[0].description;
        assert_eq!(description, &format!("Echoes its input.\n\n{LONG_RUNNING_NOTE}"));
        assert_eq!(long_running_description(""), LONG_RUNNING_NOTE);
    }

    #[test]
    fn instructions_extend_existing_system_instruction() {
        let mut request = ConversationRequest::default();
        append_instructions(&mut request, "first");
        assert_eq!(request.system_instruction().unwrap().parts.len(), 1);

        append_instructions(&mut request, "second");
        let instruction = request.system_instruction().unwrap();
        assert_eq!(instruction.role, Role::System);
        assert_eq!(instruction.parts[1].as_text(), Some("second"));
    }
}
