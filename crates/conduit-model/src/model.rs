//! Model adapter: priming, translation, dispatch and response translation

use std::sync::Arc;

use conduit_config::ModelConfig;
use futures_util::stream;
use tokio_util::sync::CancellationToken;

use crate::convert::openai::{from_openai_response, to_openai_request};
use crate::error::ModelError;
use crate::protocol::openai::{OpenAiRequest, OpenAiStreamOptions};
use crate::provider::{ChatCompletions, OpenAiClient};
use crate::stream::{ResponseStream, translate_stream};
use crate::types::{ConversationRequest, ResponseEvent, Turn};

/// Synthetic user turn for a conversation with no history
pub const START_PROMPT: &str = "Handle the requests as specified in the System Instruction.";
/// Synthetic user turn for a conversation that ends on a non-user turn
pub const CONTINUE_PROMPT: &str =
    "Continue processing previous requests as instructed. Exit or provide a summary if no more outputs are needed.";

/// A language model that turns a conversation into response events
pub trait Llm: Send + Sync {
    /// Model identifier
    fn name(&self) -> &str;

    /// Generate the next turn
    ///
    /// Batch calls yield exactly one event; streaming calls yield partial
    /// events followed by a terminal one. Failures are reported as
    /// error-populated events rather than as a separate channel.
    fn generate_content(&self, request: ConversationRequest, stream: bool, cancel: CancellationToken)
    -> ResponseStream;
}

/// Make sure the conversation ends on a user turn
///
/// Some providers only produce a new turn when the last message is
/// user-authored. History is never reordered; synthetic turns are appended.
pub fn prime_turns(turns: &mut Vec<Turn>) {
    if turns.is_empty() {
        turns.push(Turn::text("user", START_PROMPT));
    }

    if turns.last().is_some_and(|turn| !turn.role.is_user()) {
        turns.push(Turn::text("user", CONTINUE_PROMPT));
    }
}

/// [`Llm`] backed by an OpenAI-compatible chat completions endpoint
#[derive(Clone)]
pub struct OpenAiModel {
    name: String,
    client: Arc<dyn ChatCompletions>,
    include_stream_usage: bool,
}

impl OpenAiModel {
    pub fn new(name: impl Into<String>, client: Arc<dyn ChatCompletions>) -> Self {
        Self {
            name: name.into(),
            client,
            include_stream_usage: true,
        }
    }

    /// Create from the `[model]` configuration section
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be configured
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let client = OpenAiClient::from_config(config)?;

        Ok(Self {
            name: config.name.clone(),
            client: Arc::new(client),
            include_stream_usage: config.include_stream_usage,
        })
    }

    /// Whether streaming calls ask for a trailing usage chunk
    #[must_use]
    pub const fn with_stream_usage(mut self, include: bool) -> Self {
        self.include_stream_usage = include;
        self
    }

    /// Prime the conversation and translate it to wire parameters
    ///
    /// An empty model identifier on the request falls back to this model's
    /// name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a setting has no wire equivalent
    pub fn translate(&self, request: &mut ConversationRequest) -> Result<OpenAiRequest, ModelError> {
        prime_turns(&mut request.turns);

        if request.model.is_empty() {
            request.model.clone_from(&self.name);
        }

        to_openai_request(request)
    }
}

impl Llm for OpenAiModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate_content(
        &self,
        mut request: ConversationRequest,
        stream: bool,
        cancel: CancellationToken,
    ) -> ResponseStream {
        let mut wire = match self.translate(&mut request) {
            Ok(wire) => wire,
            Err(error) => {
                tracing::warn!(model = %self.name, error = %error, "request translation failed");
                return Box::pin(stream::iter([ResponseEvent::from(&error)]));
            }
        };

        if stream {
            wire.stream = Some(true);
            if self.include_stream_usage {
                wire.stream_options = Some(OpenAiStreamOptions { include_usage: true });
            }

            return translate_stream(self.client.send_streaming(wire), cancel);
        }

        let client = Arc::clone(&self.client);
        let call = async move {
            tokio::select! {
                () = cancel.cancelled() => ResponseEvent::from(&ModelError::Cancelled),
                result = client.send(&wire) => match result {
                    Ok(response) => from_openai_response(response),
                    Err(error) => ResponseEvent::from(&error),
                },
            }
        };

        Box::pin(stream::once(call))
    }
}

impl std::fmt::Debug for OpenAiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiModel")
            .field("name", &self.name)
            .field("include_stream_usage", &self.include_stream_usage)
            .finish_non_exhaustive()
    }
}
