use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::{Part, Role, Turn};

/// Knobs controlling generation
///
/// Every field is optional. An unset field means "use the provider default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling cutoff
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Upper bound on generated tokens (zero means unset)
    pub max_output_tokens: u32,
    /// Sequences that end generation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    /// Number of candidates to generate (zero or one means one)
    pub candidate_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Sampling seed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Ask for per-token log probabilities
    pub response_logprobs: bool,
    /// Number of alternatives reported per token when `response_logprobs` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<u32>,
    /// Requested response media type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    /// Instruction prepended to the conversation by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Turn>,
    /// Provider-native tools such as search grounding
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<NativeTool>,
}

/// Built-in tool executed by the provider itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeTool {
    /// Web search grounding
    GoogleSearch,
    /// Sandboxed code execution
    CodeExecution,
}

impl NativeTool {
    pub const fn name(self) -> &'static str {
        match self {
            Self::GoogleSearch => "google_search",
            Self::CodeExecution => "code_execution",
        }
    }
}

/// Schema-backed function signature offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Function name, unique within one request
    pub name: String,
    /// What the function does
    #[serde(default)]
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: Value,
    /// JSON Schema of the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Result arrives later; the model must not re-invoke while pending
    #[serde(default)]
    pub long_running: bool,
}

/// Provider-agnostic request for one model turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationRequest {
    /// Target model identifier
    #[serde(default)]
    pub model: String,
    /// Conversation history in chronological order
    #[serde(default)]
    pub turns: Vec<Turn>,
    /// Generation settings, system instruction and native tools
    #[serde(default)]
    pub config: GenerationConfig,
    /// Function declarations in registration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclaration>,
}

impl ConversationRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Append a turn to the history
    #[must_use]
    pub fn with_turn(mut self, turn: Turn) -> Self {
        self.turns.push(turn);
        self
    }

    /// Replace the system instruction with a single text part
    #[must_use]
    pub fn with_system_instruction(mut self, text: impl Into<String>) -> Self {
        self.config.system_instruction = Some(Turn::new(Role::System, vec![Part::text(text)]));
        self
    }

    pub fn system_instruction(&self) -> Option<&Turn> {
        self.config.system_instruction.as_ref()
    }

    /// Look up a declared function by name
    pub fn declaration(&self, name: &str) -> Option<&ToolDeclaration> {
        self.tools.iter().find(|decl| decl.name == name)
    }
}
