//! Provider SDK seam
//!
//! [`ChatCompletions`] is the narrow surface the model adapter consumes: one
//! batch call and one streaming call over the wire format. Transport details
//! stay behind it.

pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::ModelError;
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse, OpenAiStreamChunk};

pub use openai::OpenAiClient;

/// Raw chunks of a streamed call; a terminal failure is the last item
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<OpenAiStreamChunk, ModelError>> + Send>>;

/// Client for an OpenAI-compatible chat completions endpoint
#[async_trait]
pub trait ChatCompletions: Send + Sync {
    /// Send a non-streaming request
    async fn send(&self, request: &OpenAiRequest) -> Result<OpenAiResponse, ModelError>;

    /// Start a streaming request
    ///
    /// The connection is opened when the returned stream is first polled.
    /// Connection failures arrive as the stream's only item.
    fn send_streaming(&self, request: OpenAiRequest) -> ChunkStream;
}
