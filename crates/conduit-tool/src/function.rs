//! Tools backed by a typed async handler

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_model::ToolDeclaration;
use futures_util::future::BoxFuture;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::schema::ResolvedSchema;
use crate::tool::{Declarable, Runnable, Tool, ToolContext, long_running_description};

type Invoke = Arc<dyn Fn(ToolContext, Map<String, Value>) -> BoxFuture<'static, Result<Map<String, Value>, ToolError>> + Send + Sync>;

/// A tool whose `run` converts arguments into `In`, calls a handler, and
/// converts its `Out` back into a mapping
///
/// The handler's types are erased at [`FunctionToolBuilder::build`]; the tool
/// keeps only the resolved schemas and the invoke closure.
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    long_running: bool,
    input: ResolvedSchema,
    output: ResolvedSchema,
    invoke: Invoke,
}

impl FunctionTool {
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> FunctionToolBuilder {
        FunctionToolBuilder {
            name: name.into(),
            description: description.into(),
            input_schema: None,
            output_schema: None,
            long_running: false,
        }
    }

    pub const fn input_schema(&self) -> &ResolvedSchema {
        &self.input
    }

    pub const fn output_schema(&self) -> &ResolvedSchema {
        &self.output
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("long_running", &self.long_running)
            .finish_non_exhaustive()
    }
}

/// Builder for [`FunctionTool`]
#[derive(Debug, Clone)]
pub struct FunctionToolBuilder {
    name: String,
    description: String,
    input_schema: Option<Value>,
    output_schema: Option<Value>,
    long_running: bool,
}

impl FunctionToolBuilder {
    /// Use this schema for arguments instead of inferring one
    #[must_use]
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Use this schema for results instead of inferring one
    #[must_use]
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    #[must_use]
    pub const fn long_running(mut self, long_running: bool) -> Self {
        self.long_running = long_running;
        self
    }

    /// Resolve both schemas and wrap the handler
    ///
    /// # Errors
    ///
    /// Returns `ToolError::Schema` if either schema cannot be resolved
    pub fn build<In, Out, F, Fut>(self, handler: F) -> Result<FunctionTool, ToolError>
    where
        In: DeserializeOwned + JsonSchema + Send + 'static,
        Out: Serialize + JsonSchema + Send + 'static,
        F: Fn(ToolContext, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Out>> + Send + 'static,
    {
        let input = ResolvedSchema::resolve_input::<In>(self.input_schema)?;
        let output = ResolvedSchema::resolve::<Out>(self.output_schema)?;

        let handler = Arc::new(handler);
        let (input_schema, output_schema) = (input.clone(), output.clone());
        let invoke: Invoke = Arc::new(move |ctx, args| {
            let handler = Arc::clone(&handler);
            let input = input_schema.clone();
            let output = output_schema.clone();

            Box::pin(async move {
                let args: In = input
                    .convert(Value::Object(args))
                    .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

                let result = handler(ctx, args).await.map_err(ToolError::Handler)?;

                wrap_output(&output, &result)
            })
        });

        Ok(FunctionTool {
            name: self.name,
            description: self.description,
            long_running: self.long_running,
            input,
            output,
            invoke,
        })
    }
}

/// Convert a handler result into the mapping returned to the model
///
/// Results that are not mappings but still satisfy the output schema are
/// returned as `{"result": value}`.
fn wrap_output<Out: Serialize>(schema: &ResolvedSchema, result: &Out) -> Result<Map<String, Value>, ToolError> {
    let conversion_error = match schema.to_map(result) {
        Ok(map) => return Ok(map),
        Err(e) => e,
    };

    match serde_json::to_value(result) {
        Ok(value) if schema.is_valid(&value) => Ok(Map::from_iter([("result".to_owned(), value)])),
        _ => Err(ToolError::InvalidOutput(conversion_error.to_string())),
    }
}

impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn is_long_running(&self) -> bool {
        self.long_running
    }

    fn as_declarable(&self) -> Option<&dyn Declarable> {
        Some(self)
    }

    fn as_runnable(&self) -> Option<&dyn Runnable> {
        Some(self)
    }
}

impl Declarable for FunctionTool {
    fn declaration(&self) -> ToolDeclaration {
        let description = if self.long_running {
            long_running_description(&self.description)
        } else {
            self.description.clone()
        };

        ToolDeclaration {
            name: self.name.clone(),
            description,
            parameters: self.input.as_value().clone(),
            response: Some(self.output.as_value().clone()),
            long_running: self.long_running,
        }
    }
}

#[async_trait]
impl Runnable for FunctionTool {
    async fn run(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<Map<String, Value>, ToolError> {
        tracing::debug!(tool = %self.name, "running function tool");
        (self.invoke)(ctx.clone(), args).await
    }
}
