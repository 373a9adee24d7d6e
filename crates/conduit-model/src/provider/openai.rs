//! HTTP client for OpenAI-compatible endpoints

use async_trait::async_trait;
use conduit_config::ModelConfig;
use eventsource_stream::Eventsource;
use futures_util::{StreamExt, TryStreamExt, future, stream};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{ChatCompletions, ChunkStream};
use crate::error::ModelError;
use crate::protocol::openai::{OpenAiErrorResponse, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk};

/// Marks the end of an SSE response
const DONE_SENTINEL: &str = "[DONE]";

/// `reqwest`-backed chat completions client
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl OpenAiClient {
    pub fn new(base_url: Url, api_key: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    /// Create from the `[model]` configuration section
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Internal` if no usable base URL can be resolved
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let base_url = config.base_url()?;
        Ok(Self::new(base_url, config.api_key.clone()))
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    fn post(&self, request: &OpenAiRequest) -> RequestBuilder {
        let builder = self.client.post(self.completions_url()).json(request);

        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatCompletions for OpenAiClient {
    async fn send(&self, request: &OpenAiRequest) -> Result<OpenAiResponse, ModelError> {
        let response = self.post(request).send().await.map_err(|e| {
            tracing::error!(model = %request.model, error = %e, "upstream request failed");
            ModelError::Upstream(e.to_string())
        })?;

        let response = ensure_success(response).await?;

        response
            .json()
            .await
            .map_err(|e| ModelError::Upstream(format!("failed to parse response: {e}")))
    }

    fn send_streaming(&self, request: OpenAiRequest) -> ChunkStream {
        let builder = self.post(&request);
        let model = request.model;

        let connect = async move {
            let response = builder.send().await.map_err(|e| {
                tracing::error!(model = %model, error = %e, "upstream stream request failed");
                ModelError::Upstream(e.to_string())
            })?;

            let response = ensure_success(response).await?;

            Ok::<_, ModelError>(sse_chunks(response))
        };

        Box::pin(stream::once(connect).try_flatten())
    }
}

/// Turn a non-2xx response into `ModelError::Upstream`
async fn ensure_success(response: Response) -> Result<Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<OpenAiErrorResponse>(&body).map_or(body, |parsed| parsed.error.message);

    tracing::warn!(status = %status, message = %message, "upstream returned error");

    Err(ModelError::Upstream(format!("provider returned {status}: {message}")))
}

fn sse_chunks(response: Response) -> ChunkStream {
    let chunks = response
        .bytes_stream()
        .eventsource()
        .take_while(|event| future::ready(!matches!(event, Ok(event) if event.data.trim() == DONE_SENTINEL)))
        .map(|event| match event {
            Ok(event) => serde_json::from_str::<OpenAiStreamChunk>(event.data.trim()).map_err(|e| {
                tracing::warn!(error = %e, data = %event.data, "unparseable SSE chunk");
                ModelError::Streaming(format!("unparseable chunk: {e}"))
            }),
            Err(e) => Err(ModelError::Streaming(e.to_string())),
        });

    Box::pin(chunks)
}
