//! Schema resolution
//!
//! A [`ResolvedSchema`] is produced once, when a tool is registered, and then
//! serves three purposes: the model-facing description of a shape, validation
//! of untyped data, and conversion between untyped data and typed values.

use std::sync::Arc;

use jsonschema::Validator;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// JSON Schema paired with its compiled validator
#[derive(Clone)]
pub struct ResolvedSchema {
    schema: Arc<Value>,
    validator: Arc<Validator>,
}

impl ResolvedSchema {
    /// Synthesize a schema from the type's `JsonSchema` implementation
    pub fn infer<T: JsonSchema>() -> Result<Self, SchemaError> {
        let mut schema = serde_json::to_value(schemars::schema_for!(T))
            .map_err(|e| SchemaError::Inference(e.to_string()))?;

        if let Some(object) = schema.as_object_mut() {
            object.remove("$schema");
        }

        Self::compile(schema).map_err(|e| SchemaError::Inference(e.to_string()))
    }

    /// Use a caller-supplied schema verbatim
    pub fn from_value(schema: Value) -> Result<Self, SchemaError> {
        Self::compile(schema)
    }

    /// Use `override_schema` if present, otherwise infer from `T`
    ///
    /// An override is trusted: it is not checked against `T`.
    pub fn resolve<T: JsonSchema>(override_schema: Option<Value>) -> Result<Self, SchemaError> {
        match override_schema {
            Some(schema) => Self::from_value(schema),
            None => Self::infer::<T>(),
        }
    }

    /// Resolve a schema for tool arguments
    ///
    /// Arguments always arrive as a key/value mapping, so an inferred schema
    /// whose root is not an object is rejected.
    pub fn resolve_input<T: JsonSchema>(override_schema: Option<Value>) -> Result<Self, SchemaError> {
        if override_schema.is_some() {
            return Self::resolve::<T>(override_schema);
        }

        let resolved = Self::infer::<T>()?;
        if resolved.schema.get("type").and_then(Value::as_str) != Some("object") {
            return Err(SchemaError::Unsupported(format!(
                "{} does not describe an object",
                std::any::type_name::<T>()
            )));
        }

        Ok(resolved)
    }

    fn compile(schema: Value) -> Result<Self, SchemaError> {
        let validator = Validator::new(&schema).map_err(|e| SchemaError::Invalid(e.to_string()))?;

        Ok(Self {
            schema: Arc::new(schema),
            validator: Arc::new(validator),
        })
    }

    /// Model-facing form of the schema
    pub fn as_value(&self) -> &Value {
        &self.schema
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.validator.is_valid(value)
    }

    /// Check `value` against the schema, reporting every violation
    pub fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(value)
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("{path}: {error}")
                }
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Validation(errors.join("; ")))
        }
    }

    /// Validate untyped data, then deserialize it into `T`
    pub fn convert<T: DeserializeOwned>(&self, value: Value) -> Result<T, SchemaError> {
        self.validate(&value)?;
        serde_json::from_value(value).map_err(|e| SchemaError::Conversion(e.to_string()))
    }

    /// Serialize a typed value into a validated key/value mapping
    pub fn to_map<T: Serialize>(&self, value: &T) -> Result<Map<String, Value>, SchemaError> {
        let value = serde_json::to_value(value).map_err(|e| SchemaError::Conversion(e.to_string()))?;
        self.validate(&value)?;

        match value {
            Value::Object(map) => Ok(map),
            other => Err(SchemaError::Conversion(format!(
                "expected an object, got {}",
                json_type_name(&other)
            ))),
        }
    }
}

impl std::fmt::Debug for ResolvedSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSchema")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
