use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author of a turn
///
/// Parses from any string. Roles outside the known set are kept verbatim in
/// [`Role::Other`] so they survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// No role set, treated as user input
    #[default]
    Unspecified,
    /// End user input
    User,
    /// Model output
    Model,
    /// System instruction
    System,
    /// Developer instruction
    Developer,
    /// Any role this crate does not recognize
    Other(String),
}

impl Role {
    /// Wire string for this role
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unspecified => "",
            Self::User => "user",
            Self::Model => "model",
            Self::System => "system",
            Self::Developer => "developer",
            Self::Other(role) => role,
        }
    }

    /// Whether the role counts as user-authored
    pub const fn is_user(&self) -> bool {
        matches!(self, Self::User)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "" => Self::Unspecified,
            "user" => Self::User,
            "model" => Self::Model,
            "system" => Self::System,
            "developer" => Self::Developer,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(role) => role,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the conversation history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Author of the turn
    #[serde(default)]
    pub role: Role,
    /// Ordered content of the turn
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn new(role: impl Into<Role>, parts: Vec<Part>) -> Self {
        Self {
            role: role.into(),
            parts,
        }
    }

    /// Single-text turn
    pub fn text(role: impl Into<Role>, text: impl Into<String>) -> Self {
        Self::new(role, vec![Part::text(text)])
    }

    pub fn user(parts: Vec<Part>) -> Self {
        Self::new(Role::User, parts)
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self::new(Role::Model, parts)
    }

    /// Concatenated text of every text part
    pub fn text_content(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }

    /// Function calls carried by this turn, in order
    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(Part::as_function_call)
    }
}

/// A single piece of turn content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    /// Plain text
    Text(String),
    /// Request from the model to invoke a function
    FunctionCall(FunctionCall),
    /// Result of a function invocation
    FunctionResponse(FunctionResponse),
    /// Raw bytes with a MIME type
    InlineData(Blob),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub const fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            Self::FunctionCall(call) => Some(call),
            _ => None,
        }
    }

    pub const fn as_function_response(&self) -> Option<&FunctionResponse> {
        match self {
            Self::FunctionResponse(response) => Some(response),
            _ => None,
        }
    }
}

/// Function invocation requested by the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Provider-assigned call identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name of the function to call
    pub name: String,
    /// Arguments as a JSON object
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// Outcome of a function invocation, sent back to the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Identifier of the originating call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name of the function that ran
    pub name: String,
    /// Result mapping
    #[serde(default)]
    pub response: Map<String, Value>,
}

impl FunctionResponse {
    /// Response answering `call`
    pub fn for_call(call: &FunctionCall, response: Map<String, Value>) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            response,
        }
    }

    /// Identifier used to pair the response with its call
    pub fn call_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// Inline binary content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    /// IANA media type
    pub mime_type: String,
    /// Raw bytes
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_parse() {
        assert_eq!(Role::from(""), Role::Unspecified);
        assert_eq!(Role::from("user"), Role::User);
        assert_eq!(Role::from("model"), Role::Model);
        assert_eq!(Role::from("system"), Role::System);
        assert_eq!(Role::from("developer"), Role::Developer);
    }

    #[test]
    fn unknown_role_survives_round_trip() {
        let role: Role = serde_json::from_value(serde_json::json!("critic")).unwrap();
        assert_eq!(role, Role::Other("critic".to_owned()));
        assert_eq!(serde_json::to_value(&role).unwrap(), serde_json::json!("critic"));
    }

    #[test]
    fn part_serializes_as_tagged_variant() {
        let part = Part::FunctionCall(FunctionCall {
            id: Some("call_1".to_owned()),
            name: "lookup".to_owned(),
            args: serde_json::json!({"q": "rust"}).as_object().cloned().unwrap(),
        });

        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["function_call"]["name"], "lookup");
        assert_eq!(value["function_call"]["args"]["q"], "rust");
    }

    #[test]
    fn response_call_id_falls_back_to_name() {
        let response = FunctionResponse {
            id: None,
            name: "lookup".to_owned(),
            response: Map::new(),
        };
        assert_eq!(response.call_id(), "lookup");
    }

    #[test]
    fn text_content_joins_text_parts_only() {
        let turn = Turn::model(vec![
            Part::text("Hel"),
            Part::FunctionCall(FunctionCall::default()),
            Part::text("lo"),
        ]);
        assert_eq!(turn.text_content(), "Hello");
        assert_eq!(turn.function_calls().count(), 1);
    }
}
