use std::path::Path;

use crate::{Config, McpServerType};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml_str(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the model section or an MCP server is unusable
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_model_config()?;
        self.validate_mcp_config()?;
        Ok(())
    }

    fn validate_model_config(&self) -> anyhow::Result<()> {
        if self.model.name.trim().is_empty() {
            anyhow::bail!("model.name must not be empty");
        }

        if let Some(ref url) = self.model.base_url
            && !matches!(url.scheme(), "http" | "https")
        {
            anyhow::bail!("model.base_url must be an http(s) URL, got scheme '{}'", url.scheme());
        }

        Ok(())
    }

    fn validate_mcp_config(&self) -> anyhow::Result<()> {
        for (name, server) in &self.mcp.servers {
            match &server.server_type {
                McpServerType::Stdio(stdio) if stdio.command.trim().is_empty() => {
                    anyhow::bail!("MCP server '{name}' has an empty command");
                }
                McpServerType::Sse(http) | McpServerType::StreamableHttp(http)
                    if !matches!(http.url.scheme(), "http" | "https") =>
                {
                    anyhow::bail!("MCP server '{name}' must use an http(s) URL");
                }
                _ => {}
            }
        }

        Ok(())
    }
}
