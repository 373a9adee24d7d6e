//! Canonical conversation model
//!
//! Provider-agnostic vocabulary shared by every translator and tool. Wire
//! formats convert to and from these types; nothing here talks to a network.

pub mod content;
pub mod request;
pub mod response;

pub use content::{Blob, FunctionCall, FunctionResponse, Part, Role, Turn};
pub use request::{ConversationRequest, GenerationConfig, NativeTool, ToolDeclaration};
pub use response::{
    CANCELLED_CODE, FinishReason, INTERNAL_ERROR_CODE, INVALID_REQUEST_CODE, MALFORMED_FUNCTION_CALL_CODE,
    ResponseEvent, STREAM_ERROR_CODE, UNKNOWN_ERROR_CODE, UNKNOWN_ERROR_MESSAGE, UPSTREAM_ERROR_CODE, UsageMetadata,
};
