#![allow(clippy::must_use_candidate)]

mod env;
mod loader;
pub mod mcp;
pub mod model;
pub mod telemetry;

use serde::Deserialize;

pub use mcp::*;
pub use model::*;
pub use telemetry::*;

/// Top-level Conduit configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Model provider configuration
    #[serde(default)]
    pub model: ModelConfig,
    /// Remote tool server configuration
    #[serde(default)]
    pub mcp: McpConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
