//! Artifact storage and the `load_artifacts` tool
//!
//! Loading is a two-step exchange. The model calls `load_artifacts`, which
//! only echoes the requested names. On the next request the tool spots that
//! echo in the latest turn and appends the artifact contents, fetched
//! concurrently. Contents are never cached across turns so the model always
//! sees the current artifact.

use std::sync::Arc;

use async_trait::async_trait;
use conduit_model::{ConversationRequest, Part, ToolDeclaration, Turn};
use futures_util::future::try_join_all;
use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;

use crate::error::{ArtifactError, ToolError};
use crate::tool::{Declarable, RequestProcessor, Runnable, Tool, ToolContext, append_instructions, pack_tool};

/// Name the model uses to call [`LoadArtifactsTool`]
pub const LOAD_ARTIFACTS_TOOL_NAME: &str = "load_artifacts";

const ARTIFACT_NAMES_KEY: &str = "artifact_names";

/// Named content available to a session
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Artifact names in a stable order
    async fn list(&self) -> Result<Vec<String>, ArtifactError>;

    async fn load(&self, name: &str) -> Result<Part, ArtifactError>;
}

/// [`ArtifactStore`] keeping artifacts in insertion order
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<IndexMap<String, Part>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `part` under `name`, replacing any previous content
    pub async fn insert(&self, name: impl Into<String>, part: Part) {
        self.artifacts.write().await.insert(name.into(), part);
    }

    pub async fn remove(&self, name: &str) -> Option<Part> {
        self.artifacts.write().await.shift_remove(name)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn list(&self) -> Result<Vec<String>, ArtifactError> {
        Ok(self.artifacts.read().await.keys().cloned().collect())
    }

    async fn load(&self, name: &str) -> Result<Part, ArtifactError> {
        self.artifacts
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(name.to_owned()))
    }
}

/// Lets the model pull artifact contents into the conversation
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadArtifactsTool;

impl LoadArtifactsTool {
    pub const fn new() -> Self {
        Self
    }

    async fn append_initial_instructions(
        store: &dyn ArtifactStore,
        request: &mut ConversationRequest,
    ) -> Result<(), ToolError> {
        let names = store
            .list()
            .await
            .map_err(|e| ToolError::Handler(anyhow::Error::new(e).context("failed to list artifacts")))?;

        if names.is_empty() {
            return Ok(());
        }

        let listed = Value::from(names).to_string();
        append_instructions(
            request,
            format!(
                "You have a list of artifacts:\n  {listed}\n\nWhen the user asks questions about any of the \
                 artifacts, you should call the `load_artifacts` function to load the artifact. Do not generate \
                 any text other than the function call. Whenever you are asked about artifacts, you should first \
                 load it. You must always load an artifact to access its content, even if it has been loaded \
                 before."
            ),
        );

        Ok(())
    }
}

/// Names echoed by a `load_artifacts` result in the first part of the latest turn
fn requested_artifacts(request: &ConversationRequest) -> Option<Vec<String>> {
    let response = request
        .turns
        .last()?
        .parts
        .first()?
        .as_function_response()
        .filter(|response| response.name == LOAD_ARTIFACTS_TOOL_NAME)?;

    let names = response.response.get(ARTIFACT_NAMES_KEY)?;
    let names: Option<Vec<String>> = names
        .as_array()?
        .iter()
        .map(|name| name.as_str().map(str::to_owned))
        .collect();

    if names.is_none() {
        tracing::debug!(tool = LOAD_ARTIFACTS_TOOL_NAME, "ignoring artifact names that are not all strings");
    }

    names
}

/// Load every artifact concurrently, keeping the requested order
///
/// The first failure cancels the remaining loads and is returned alone.
async fn load_all(ctx: &ToolContext, store: &dyn ArtifactStore, names: &[String]) -> Result<Vec<Turn>, ToolError> {
    let scope = ctx.cancellation_token().child_token();

    let loads = names.iter().map(|name| {
        let scope = scope.clone();
        async move {
            let part = tokio::select! {
                () = scope.cancelled() => return Err(ToolError::Cancelled),
                loaded = store.load(name) => loaded.map_err(|source| ToolError::Artifact {
                    name: name.clone(),
                    source,
                })?,
            };

            Ok::<_, ToolError>(Turn::user(vec![Part::text(format!("Artifact {name} is:")), part]))
        }
    });

    let loaded = try_join_all(loads).await;
    if let Err(e) = &loaded {
        scope.cancel();
        tracing::warn!(error = %e, "artifact loading aborted");
    }

    loaded
}

impl Tool for LoadArtifactsTool {
    fn name(&self) -> &str {
        LOAD_ARTIFACTS_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Loads the artifacts and adds them to the session."
    }

    fn as_declarable(&self) -> Option<&dyn Declarable> {
        Some(self)
    }

    fn as_runnable(&self) -> Option<&dyn Runnable> {
        Some(self)
    }

    fn as_request_processor(&self) -> Option<&dyn RequestProcessor> {
        Some(self)
    }
}

impl Declarable for LoadArtifactsTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: LOAD_ARTIFACTS_TOOL_NAME.to_owned(),
            description: self.description().to_owned(),
            parameters: json!({
                "type": "object",
                "properties": {
                    ARTIFACT_NAMES_KEY: {
                        "type": "array",
                        "items": {"type": "string"}
                    }
                }
            }),
            response: None,
            long_running: false,
        }
    }
}

#[async_trait]
impl Runnable for LoadArtifactsTool {
    async fn run(&self, _ctx: &ToolContext, args: Map<String, Value>) -> Result<Map<String, Value>, ToolError> {
        let names = match args.get(ARTIFACT_NAMES_KEY) {
            Some(value) => serde_json::from_value::<Option<Vec<String>>>(value.clone())
                .map_err(|e| ToolError::InvalidArguments(format!("{ARTIFACT_NAMES_KEY}: {e}")))?
                .unwrap_or_default(),
            None => Vec::new(),
        };

        Ok(Map::from_iter([(ARTIFACT_NAMES_KEY.to_owned(), Value::from(names))]))
    }
}

#[async_trait]
impl RequestProcessor for LoadArtifactsTool {
    async fn process_request(&self, ctx: &ToolContext, request: &mut ConversationRequest) -> Result<(), ToolError> {
        let store = Arc::clone(ctx.artifacts().ok_or(ToolError::MissingArtifactStore)?);

        pack_tool(request, self)?;
        Self::append_initial_instructions(store.as_ref(), request).await?;

        let Some(names) = requested_artifacts(request) else {
            return Ok(());
        };
        if names.is_empty() {
            return Ok(());
        }

        tracing::debug!(count = names.len(), "loading requested artifacts");
        let turns = load_all(ctx, store.as_ref(), &names).await?;
        request.turns.extend(turns);

        Ok(())
    }
}
