//! `rmcp`-backed sessions
//!
//! [`RmcpSessionProvider`] connects on first use and keeps the session until
//! a transport failure invalidates it. The next call then reconnects.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_config::{HttpConfig, McpServerType, StdioConfig};
use rmcp::model::{CallToolRequestParam, CallToolResult, RawContent};
use rmcp::service::{RoleClient, RunningService, ServiceExt as _};
use rmcp::transport::TokioChildProcess;
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::McpError;
use crate::session::{RemoteCallResult, RemoteContent, RemoteSession, RemoteToolSpec, SessionProvider};

/// Connected rmcp client service
pub struct RmcpSession {
    service: RunningService<RoleClient, ()>,
    server_name: String,
}

impl RmcpSession {
    /// Connect to an MCP server and complete the handshake
    pub async fn connect(name: &str, server_type: &McpServerType) -> Result<Self, McpError> {
        let service = match server_type {
            McpServerType::Stdio(config) => connect_stdio(config).await?,
            McpServerType::Sse(config) => connect_sse(config).await?,
            McpServerType::StreamableHttp(config) => connect_streamable_http(config).await?,
        };

        tracing::info!(server = name, transport = server_type.transport_name(), "connected to MCP server");

        Ok(Self {
            service,
            server_name: name.to_owned(),
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

#[async_trait]
impl RemoteSession for RmcpSession {
    async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>, McpError> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|e| McpError::Transport(format!("list_tools failed on {}: {e}", self.server_name)))?;

        Ok(tools
            .into_iter()
            .map(|tool| RemoteToolSpec {
                name: tool.name.to_string(),
                description: tool.description.as_deref().unwrap_or_default().to_owned(),
                input_schema: Value::Object((*tool.input_schema).clone()),
                output_schema: tool.output_schema.map(|schema| Value::Object((*schema).clone())),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<RemoteCallResult, McpError> {
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: Cow::Owned(name.to_owned()),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| McpError::Transport(format!("failed to call MCP tool {name:?}: {e}")))?;

        Ok(call_result(result))
    }
}

fn call_result(result: CallToolResult) -> RemoteCallResult {
    let content = result
        .content
        .into_iter()
        .map(|content| match content.raw {
            RawContent::Text(text) => RemoteContent::Text(text.text),
            _ => RemoteContent::Other,
        })
        .collect();

    RemoteCallResult {
        is_error: result.is_error.unwrap_or(false),
        content,
        structured: result.structured_content,
    }
}

async fn connect_stdio(config: &StdioConfig) -> Result<RunningService<RoleClient, ()>, McpError> {
    let mut cmd = tokio::process::Command::new(&config.command);
    cmd.args(&config.args).envs(&config.env);

    let transport =
        TokioChildProcess::new(cmd).map_err(|e| McpError::Transport(format!("failed to spawn process: {e}")))?;

    ().serve(transport)
        .await
        .map_err(|e| McpError::Transport(format!("STDIO handshake failed: {e}")))
}

async fn connect_sse(config: &HttpConfig) -> Result<RunningService<RoleClient, ()>, McpError> {
    use rmcp::transport::SseClientTransport;
    use rmcp::transport::sse_client::SseClientConfig;

    let sse_config = SseClientConfig {
        sse_endpoint: Arc::from(config.url.as_str()),
        ..Default::default()
    };

    let client = authorized_client(config)?;

    let transport = SseClientTransport::start_with_client(client, sse_config)
        .await
        .map_err(|e| McpError::Transport(format!("SSE connection failed: {e}")))?;

    ().serve(transport)
        .await
        .map_err(|e| McpError::Transport(format!("SSE handshake failed: {e}")))
}

async fn connect_streamable_http(config: &HttpConfig) -> Result<RunningService<RoleClient, ()>, McpError> {
    use rmcp::transport::StreamableHttpClientTransport;
    use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;

    let mut transport_config = StreamableHttpClientTransportConfig::with_uri(config.url.as_str());

    if let Some(token) = config.bearer_token() {
        transport_config = transport_config.auth_header(format!("Bearer {}", token.expose_secret()));
    }

    let transport = StreamableHttpClientTransport::with_client(reqwest::Client::new(), transport_config);

    ().serve(transport)
        .await
        .map_err(|e| McpError::Transport(format!("StreamableHTTP handshake failed: {e}")))
}

/// HTTP client sending the configured bearer token on every request
fn authorized_client(config: &HttpConfig) -> Result<reqwest::Client, McpError> {
    let mut builder = reqwest::Client::builder();

    if let Some(token) = config.bearer_token() {
        let mut value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| McpError::Transport(format!("invalid auth token: {e}")))?;
        value.set_sensitive(true);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::AUTHORIZATION, value);
        builder = builder.default_headers(headers);
    }

    builder
        .build()
        .map_err(|e| McpError::Transport(format!("failed to build HTTP client: {e}")))
}

/// [`SessionProvider`] for one configured server
pub struct RmcpSessionProvider {
    name: String,
    server_type: McpServerType,
    session: Mutex<Option<Arc<RmcpSession>>>,
}

impl RmcpSessionProvider {
    /// Provider that connects lazily on the first request
    pub fn new(name: impl Into<String>, server_type: McpServerType) -> Self {
        Self {
            name: name.into(),
            server_type,
            session: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for RmcpSessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RmcpSessionProvider")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionProvider for RmcpSessionProvider {
    async fn session(&self) -> Result<Arc<dyn RemoteSession>, McpError> {
        let mut cached = self.session.lock().await;

        if let Some(session) = cached.as_ref() {
            return Ok(Arc::clone(session) as Arc<dyn RemoteSession>);
        }

        let session = Arc::new(RmcpSession::connect(&self.name, &self.server_type).await?);
        *cached = Some(Arc::clone(&session));

        Ok(session)
    }

    async fn invalidate(&self) {
        if self.session.lock().await.take().is_some() {
            tracing::warn!(server = %self.name, "dropping MCP session after transport failure");
        }
    }
}
