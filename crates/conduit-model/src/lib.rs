//! Model adaptation for Conduit
//!
//! Translates a provider-agnostic conversation into `OpenAI` chat completion
//! parameters and translates batch and streamed responses back into
//! canonical [`ResponseEvent`]s, keeping usage and finish-reason semantics.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod convert;
pub mod error;
pub mod model;
pub mod protocol;
pub mod provider;
pub mod stream;
pub mod types;

pub use error::ModelError;
pub use model::{Llm, OpenAiModel, prime_turns};
pub use provider::{ChatCompletions, ChunkStream, OpenAiClient};
pub use stream::{ChunkTranslator, ResponseStream, translate_stream};
pub use types::{
    Blob, ConversationRequest, FinishReason, FunctionCall, FunctionResponse, GenerationConfig, NativeTool, Part,
    ResponseEvent, Role, ToolDeclaration, Turn, UsageMetadata,
};
