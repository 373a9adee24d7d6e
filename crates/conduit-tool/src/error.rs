use thiserror::Error;

/// Schema resolution and conversion errors
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The type's schema could not be generated or serialized
    #[error("schema inference failed: {0}")]
    Inference(String),

    /// An override schema is not a valid JSON Schema
    #[error("invalid schema: {0}")]
    Invalid(String),

    /// The inferred shape cannot describe tool arguments
    #[error("unsupported schema shape: {0}")]
    Unsupported(String),

    /// A value does not satisfy the schema
    #[error("schema validation failed: {0}")]
    Validation(String),

    /// A value satisfies the schema but does not fit the target type
    #[error("conversion failed: {0}")]
    Conversion(String),
}

/// Artifact store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("artifact I/O error: {0}")]
    Io(String),
}

/// Tool registration and execution errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments do not match the tool's input schema
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The handler result matches neither a mapping nor the output schema
    #[error("invalid output: {0}")]
    InvalidOutput(String),

    /// Schema resolution failed at registration time
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The tool's handler failed
    #[error("tool handler failed: {0}")]
    Handler(anyhow::Error),

    /// A function with this name is already declared on the request
    #[error("duplicate tool: {0}")]
    DuplicateTool(String),

    /// No active tool has this name
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The tool has no `run` capability
    #[error("tool is not runnable: {0}")]
    NotRunnable(String),

    /// The tool context carries no artifact store
    #[error("no artifact store available in tool context")]
    MissingArtifactStore,

    /// Loading one artifact failed
    #[error("failed to load artifact {name}: {source}")]
    Artifact {
        name: String,
        #[source]
        source: ArtifactError,
    },

    /// A remote tool endpoint failed
    #[error("{0}")]
    Remote(String),

    /// The operation was cancelled
    #[error("tool execution cancelled")]
    Cancelled,
}
