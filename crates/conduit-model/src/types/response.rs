use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use super::content::Turn;

/// Provider accepted the call but returned no usable choice
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN_ERROR";
/// Message paired with [`UNKNOWN_ERROR_CODE`]
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error.";
/// Tool-call arguments were not a JSON object
pub const MALFORMED_FUNCTION_CALL_CODE: &str = "MALFORMED_FUNCTION_CALL";
/// The request could not be expressed in the provider protocol
pub const INVALID_REQUEST_CODE: &str = "INVALID_REQUEST";
/// Transport or provider rejection
pub const UPSTREAM_ERROR_CODE: &str = "UPSTREAM_ERROR";
/// Failure while reading a response stream
pub const STREAM_ERROR_CODE: &str = "STREAM_ERROR";
/// Caller cancelled the call
pub const CANCELLED_CODE: &str = "CANCELLED";
/// Unexpected local failure
pub const INTERNAL_ERROR_CODE: &str = "INTERNAL_ERROR";

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    /// Natural stop point, stop sequence, or tool call
    Stop,
    /// Output token limit reached
    MaxTokens,
    /// Output withheld by content filtering
    Safety,
}

/// Token accounting for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_token_count: u32,
    pub candidates_token_count: u32,
    pub total_token_count: u32,
    /// Reasoning tokens, already included in the candidate count
    pub thoughts_token_count: u32,
}

impl AddAssign for UsageMetadata {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_token_count = self.prompt_token_count.saturating_add(rhs.prompt_token_count);
        self.candidates_token_count = self.candidates_token_count.saturating_add(rhs.candidates_token_count);
        self.total_token_count = self.total_token_count.saturating_add(rhs.total_token_count);
        self.thoughts_token_count = self.thoughts_token_count.saturating_add(rhs.thoughts_token_count);
    }
}

/// One unit of model output
///
/// A streamed turn is a run of `partial` events followed by a single terminal
/// event carrying the finish reason. A batch call yields exactly one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvent {
    /// Produced content, role is always `model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Incremental fragment of a streamed turn
    #[serde(default)]
    pub partial: bool,
    /// No more content follows for this turn
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ResponseEvent {
    /// Content-less event describing a failure
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code.into()),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub const fn is_error(&self) -> bool {
        self.error_code.is_some()
    }

    /// Concatenated text of the content, empty when there is none
    pub fn text(&self) -> String {
        self.content.as_ref().map(Turn::text_content).unwrap_or_default()
    }
}
