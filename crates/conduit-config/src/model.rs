use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Default `OpenAI` API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Model provider configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Provider protocol
    #[serde(default)]
    pub provider: ModelProviderType,
    /// Model identifier sent to the provider
    #[serde(default)]
    pub name: String,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// API key sent as a bearer token
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Ask the provider to report usage on the final stream chunk
    #[serde(default = "default_include_stream_usage")]
    pub include_stream_usage: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProviderType::default(),
            name: String::new(),
            base_url: None,
            api_key: None,
            include_stream_usage: default_include_stream_usage(),
        }
    }
}

impl ModelConfig {
    /// Configured base URL, or the provider default
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in default URL fails to parse
    pub fn base_url(&self) -> anyhow::Result<Url> {
        match &self.base_url {
            Some(url) => Ok(url.clone()),
            None => match self.provider {
                ModelProviderType::Openai => Url::parse(DEFAULT_OPENAI_BASE_URL)
                    .map_err(|e| anyhow::anyhow!("invalid default base URL: {e}")),
            },
        }
    }
}

/// Supported model provider protocols
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProviderType {
    /// OpenAI-compatible chat completions API
    #[default]
    Openai,
}

const fn default_include_stream_usage() -> bool {
    true
}
