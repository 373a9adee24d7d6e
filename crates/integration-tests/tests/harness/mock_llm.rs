//! Mock OpenAI-compatible backend for integration tests
//!
//! Batch calls answer "Hi", or a `get_weather` tool call when tools are
//! declared and no tool result has been sent yet. Streaming calls answer with
//! the chunks "Hel", "lo" (finish reason `length`) and a usage-only chunk.
//! A broken stream sends "Hel" followed by a raw `data:` payload and then
//! `[DONE]`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::stream;
use serde::Serialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Mock backend returning predictable completions
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

#[derive(Default)]
struct MockLlmState {
    completion_count: AtomicU32,
    /// Number of requests to fail before succeeding
    fail_count: AtomicU32,
    /// Stream chunks forever instead of the canned sequence
    endless_stream: bool,
    /// Raw payload sent after the first chunk instead of the canned rest
    broken_payload: Option<&'static str>,
    /// Set once an endless stream body has been dropped
    stream_released: Arc<AtomicBool>,
    requests: Mutex<Vec<Value>>,
    authorization: Mutex<Option<String>>,
}

impl MockLlm {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(MockLlmState::default()).await
    }

    /// Start a mock that fails the first `n` requests with 500
    pub async fn start_failing(n: u32) -> anyhow::Result<Self> {
        Self::start_inner(MockLlmState {
            fail_count: AtomicU32::new(n),
            ..MockLlmState::default()
        })
        .await
    }

    /// Start a mock whose streams never finish on their own
    pub async fn start_endless() -> anyhow::Result<Self> {
        Self::start_inner(MockLlmState {
            endless_stream: true,
            ..MockLlmState::default()
        })
        .await
    }

    /// Start a mock whose streams break after the first chunk with `payload`
    pub async fn start_broken_stream(payload: &'static str) -> anyhow::Result<Self> {
        Self::start_inner(MockLlmState {
            broken_payload: Some(payload),
            ..MockLlmState::default()
        })
        .await
    }

    async fn start_inner(state: MockLlmState) -> anyhow::Result<Self> {
        let state = Arc::new(state);

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL including `/v1`, as the client appends `/chat/completions`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn completion_count(&self) -> u32 {
        self.state.completion_count.load(Ordering::Relaxed)
    }

    /// Bodies of every request received, oldest first
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    /// `Authorization` header of the latest request
    pub fn authorization(&self) -> Option<String> {
        self.state.authorization.lock().unwrap().clone()
    }

    /// Whether the server has dropped an endless stream body
    pub fn stream_released(&self) -> bool {
        self.state.stream_released.load(Ordering::SeqCst)
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- Wire types matching OpenAI format --

#[derive(Debug, Serialize)]
struct ChatCompletionResponse {
    id: &'static str,
    object: &'static str,
    created: u64,
    model: String,
    choices: Vec<Choice>,
    usage: Usage,
}

#[derive(Debug, Serialize)]
struct Choice {
    index: u32,
    message: ResponseMessage,
    finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
struct ResponseMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallResponse>>,
}

#[derive(Debug, Serialize)]
struct ToolCallResponse {
    id: &'static str,
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: FunctionCallResponse,
}

#[derive(Debug, Serialize)]
struct FunctionCallResponse {
    name: &'static str,
    arguments: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

const USAGE: Usage = Usage {
    prompt_tokens: 10,
    completion_tokens: 5,
    total_tokens: 15,
};

#[derive(Debug, Serialize)]
struct StreamChunk {
    id: &'static str,
    object: &'static str,
    created: u64,
    model: String,
    choices: Vec<StreamChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<Usage>,
}

#[derive(Debug, Serialize)]
struct StreamChoice {
    index: u32,
    delta: StreamDelta,
    #[serde(skip_serializing_if = "Option::is_none")]
    finish_reason: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct StreamDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

impl StreamChunk {
    fn text(model: &str, content: &str, finish_reason: Option<&'static str>) -> Self {
        Self {
            id: "chatcmpl-test-stream",
            object: "chat.completion.chunk",
            created: 1_700_000_000,
            model: model.to_owned(),
            choices: vec![StreamChoice {
                index: 0,
                delta: StreamDelta {
                    content: Some(content.to_owned()),
                },
                finish_reason,
            }],
            usage: None,
        }
    }

    fn usage(model: &str) -> Self {
        Self {
            choices: Vec::new(),
            usage: Some(USAGE),
            ..Self::text(model, "", None)
        }
    }

    fn sse(&self) -> String {
        format!("data: {}\n\n", serde_json::to_string(self).unwrap())
    }
}

/// Marks the shared flag when the stream body is dropped
struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

// -- Handlers --

async fn handle_chat_completions(
    State(state): State<Arc<MockLlmState>>,
    headers: HeaderMap,
    Json(req): Json<Value>,
) -> Response {
    state.completion_count.fetch_add(1, Ordering::Relaxed);
    state.requests.lock().unwrap().push(req.clone());
    *state.authorization.lock().unwrap() = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let remaining = state.fail_count.load(Ordering::Relaxed);
    if remaining > 0 {
        state.fail_count.fetch_sub(1, Ordering::Relaxed);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": {
                    "message": "mock server intentional failure",
                    "type": "server_error"
                }
            })),
        )
            .into_response();
    }

    let model = req["model"].as_str().unwrap_or_default().to_owned();

    if req["stream"].as_bool().unwrap_or(false) {
        return match state.broken_payload {
            Some(payload) => broken_stream(&model, payload),
            None if state.endless_stream => endless_stream(&state, model),
            None => canned_stream(&model),
        };
    }

    let answered_tool = req["messages"]
        .as_array()
        .and_then(|messages| messages.last())
        .is_some_and(|message| message["role"] == "tool");
    let has_tools = req["tools"].as_array().is_some_and(|tools| !tools.is_empty());

    let (content, tool_calls, finish_reason) = if has_tools && !answered_tool {
        (
            None,
            Some(vec![ToolCallResponse {
                id: "call_test_123",
                tool_type: "function",
                function: FunctionCallResponse {
                    name: "get_weather",
                    arguments: r#"{"city":"Oslo"}"#,
                },
            }]),
            "tool_calls",
        )
    } else if answered_tool {
        (Some("It is sunny in Oslo".to_owned()), None, "stop")
    } else {
        (Some("Hi".to_owned()), None, "stop")
    };

    Json(ChatCompletionResponse {
        id: "chatcmpl-test-123",
        object: "chat.completion",
        created: 1_700_000_000,
        model,
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant",
                content,
                tool_calls,
            },
            finish_reason,
        }],
        usage: USAGE,
    })
    .into_response()
}

fn canned_stream(model: &str) -> Response {
    let mut body = String::new();
    body.push_str(&StreamChunk::text(model, "Hel", None).sse());
    body.push_str(&StreamChunk::text(model, "lo", Some("length")).sse());
    body.push_str(&StreamChunk::usage(model).sse());
    body.push_str("data: [DONE]\n\n");

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

fn broken_stream(model: &str, payload: &str) -> Response {
    let mut body = StreamChunk::text(model, "Hel", None).sse();
    body.push_str(&format!("data: {payload}\n\n"));
    body.push_str("data: [DONE]\n\n");

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

fn endless_stream(state: &MockLlmState, model: String) -> Response {
    let flag = ReleaseFlag(Arc::clone(&state.stream_released));

    let chunks = stream::unfold((flag, model, 0_u64), |(flag, model, n)| async move {
        if n > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let chunk = StreamChunk::text(&model, &format!("tick{n} "), None).sse();
        Some((Ok::<_, std::convert::Infallible>(chunk), (flag, model, n + 1)))
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(chunks),
    )
        .into_response()
}
