//! Tools for Conduit
//!
//! Capability-based tool abstraction, schema resolution for typed handlers,
//! provider-native tools, request-time dispatch, and the concurrent artifact
//! loader.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod artifacts;
pub mod dispatch;
pub mod error;
pub mod function;
pub mod native;
pub mod schema;
pub mod tool;

pub use artifacts::{ArtifactStore, InMemoryArtifactStore, LOAD_ARTIFACTS_TOOL_NAME, LoadArtifactsTool};
pub use dispatch::{Predicate, ToolDispatcher, Toolset, string_predicate};
pub use error::{ArtifactError, SchemaError, ToolError};
pub use function::{FunctionTool, FunctionToolBuilder};
pub use native::NativeTool;
pub use schema::ResolvedSchema;
pub use tool::{
    Declarable, LONG_RUNNING_NOTE, RequestProcessor, Runnable, Tool, ToolContext, append_instructions,
    long_running_description, pack_tool,
};
