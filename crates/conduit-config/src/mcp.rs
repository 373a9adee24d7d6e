use std::collections::HashMap;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// `[mcp]` section: remote tool servers whose tools are offered to the model
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McpConfig {
    /// Servers by name, in file order
    #[serde(default)]
    pub servers: IndexMap<String, McpServerConfig>,
}

/// One `[mcp.servers.<name>]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McpServerConfig {
    #[serde(rename = "type")]
    pub server_type: McpServerType,
    /// Tool names to expose; an empty list exposes every tool
    #[serde(default)]
    pub tool_filter: Vec<String>,
}

/// How a server is reached, selected by the `transport` key
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum McpServerType {
    /// Child process speaking over stdin/stdout
    Stdio(StdioConfig),
    /// Legacy HTTP + server-sent events
    Sse(HttpConfig),
    StreamableHttp(HttpConfig),
}

impl McpServerType {
    /// Value of the `transport` key
    pub const fn transport_name(&self) -> &'static str {
        match self {
            Self::Stdio(_) => "stdio",
            Self::Sse(_) => "sse",
            Self::StreamableHttp(_) => "streamable_http",
        }
    }
}

/// Child process launch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StdioConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra variables set for the child on top of the inherited environment
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Remote endpoint settings shared by the HTTP transports
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    pub url: Url,
    #[serde(default)]
    pub auth: Option<McpAuthConfig>,
}

impl HttpConfig {
    /// Token to send as `Authorization: Bearer ...`, if configured
    pub fn bearer_token(&self) -> Option<&SecretString> {
        match &self.auth {
            Some(McpAuthConfig::Token { token }) => Some(token),
            None => None,
        }
    }
}

/// Credentials presented to an HTTP server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpAuthConfig {
    Token { token: SecretString },
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn http_servers_expose_their_token() {
        let server: McpServerConfig = toml::from_str(
            r#"
type = { transport = "sse", url = "https://tools.example.com/sse", auth = { type = "token", token = "abc" } }
"#,
        )
        .unwrap();

        assert_eq!(server.server_type.transport_name(), "sse");
        let McpServerType::Sse(http) = &server.server_type else {
            panic!("expected an SSE server");
        };
        assert_eq!(http.bearer_token().unwrap().expose_secret(), "abc");
        assert!(server.tool_filter.is_empty());
    }
}
