//! MCP bridge for Conduit
//!
//! Exposes tools served by remote MCP servers as Conduit tools. Sessions are
//! requested per call through a [`SessionProvider`].

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod client;
pub mod error;
pub mod session;
pub mod tool;
pub mod toolset;

pub use client::{RmcpSession, RmcpSessionProvider};
pub use error::McpError;
pub use session::{RemoteCallResult, RemoteContent, RemoteSession, RemoteToolSpec, SessionProvider};
pub use tool::McpTool;
pub use toolset::McpToolset;
