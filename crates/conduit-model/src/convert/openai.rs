//! Translation between the canonical conversation model and `OpenAI` chat completions

use base64::Engine;
use serde_json::{Map, Value};

use crate::error::ModelError;
use crate::protocol::openai::{
    OpenAiContent, OpenAiContentPart, OpenAiFunction, OpenAiFunctionCall, OpenAiImageUrl, OpenAiMessage,
    OpenAiRequest, OpenAiResponse, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::types::{
    Blob, ConversationRequest, FinishReason, FunctionCall, FunctionResponse, GenerationConfig,
    MALFORMED_FUNCTION_CALL_CODE, Part, ResponseEvent, Role, ToolDeclaration, Turn, UNKNOWN_ERROR_CODE,
    UNKNOWN_ERROR_MESSAGE, UsageMetadata,
};

const FUNCTION_TYPE: &str = "function";
const ASSISTANT: &str = "assistant";

// -- Outbound: canonical request -> chat completion parameters --

/// Translate a conversation request into chat completion parameters
///
/// Turns are copied in order; nothing is reordered or primed here. The
/// system instruction follows the translated turns.
pub fn to_openai_request(request: &ConversationRequest) -> Result<OpenAiRequest, ModelError> {
    let mut wire = OpenAiRequest {
        model: request.model.clone(),
        ..OpenAiRequest::default()
    };

    apply_generation_config(&mut wire, &request.config)?;

    for turn in &request.turns {
        append_turn(&mut wire.messages, turn)?;
    }

    if let Some(instruction) = &request.config.system_instruction {
        wire.messages.extend(system_messages(instruction));
    }

    if !request.tools.is_empty() {
        wire.tools = Some(request.tools.iter().map(tool_to_openai).collect());
    }

    Ok(wire)
}

fn apply_generation_config(wire: &mut OpenAiRequest, config: &GenerationConfig) -> Result<(), ModelError> {
    if config.top_k.is_some() {
        return Err(ModelError::UnsupportedParameter("top_k".to_owned()));
    }

    if let Some(mime) = config.response_mime_type.as_deref()
        && !mime.is_empty()
        && mime != "text/plain"
    {
        return Err(ModelError::UnsupportedResponseFormat(mime.to_owned()));
    }

    if let Some(tool) = config.tools.first() {
        return Err(ModelError::UnsupportedParameter(format!("tools.{}", tool.name())));
    }

    wire.temperature = config.temperature;
    wire.top_p = config.top_p;
    wire.max_tokens = (config.max_output_tokens > 0).then_some(config.max_output_tokens);
    wire.stop = (!config.stop_sequences.is_empty()).then(|| config.stop_sequences.clone());
    wire.n = (config.candidate_count > 1).then_some(config.candidate_count);
    wire.frequency_penalty = config.frequency_penalty;
    wire.presence_penalty = config.presence_penalty;
    wire.seed = config.seed;

    if config.response_logprobs {
        wire.logprobs = Some(true);
        wire.top_logprobs = Some(config.logprobs.unwrap_or(1));
    }

    Ok(())
}

/// Wire role for a canonical role, `None` for roles the protocol lacks
const fn wire_role(role: &Role) -> Option<&'static str> {
    match role {
        Role::Unspecified | Role::User => Some("user"),
        Role::Model => Some(ASSISTANT),
        Role::System => Some("system"),
        Role::Developer => Some("developer"),
        Role::Other(_) => None,
    }
}

fn append_turn(messages: &mut Vec<OpenAiMessage>, turn: &Turn) -> Result<(), ModelError> {
    if turn.parts.is_empty() {
        return Ok(());
    }

    let Some(role) = wire_role(&turn.role) else {
        tracing::debug!(role = %turn.role, "dropping turn with unrecognized role");
        return Ok(());
    };

    let mut content = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_results = Vec::new();

    for part in &turn.parts {
        match part {
            Part::Text(text) if text.is_empty() => {}
            Part::Text(text) => content.push(OpenAiContentPart::Text { text: text.clone() }),
            Part::InlineData(blob) => content.push(inline_data_part(role, blob)?),
            Part::FunctionCall(call) if role == ASSISTANT => tool_calls.push(tool_call_to_openai(call)),
            Part::FunctionCall(call) => {
                return Err(ModelError::Translation(format!(
                    "function call `{}` can only appear in a model turn",
                    call.name
                )));
            }
            Part::FunctionResponse(response) => tool_results.push(tool_result_message(response)),
        }
    }

    let message = (!content.is_empty() || !tool_calls.is_empty()).then(|| OpenAiMessage {
        role: role.to_owned(),
        content: merge_content(content),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
    });

    // Tool results must directly follow the assistant message that requested them
    if role == ASSISTANT {
        messages.extend(message);
        messages.extend(tool_results);
    } else {
        messages.extend(tool_results);
        messages.extend(message);
    }

    Ok(())
}

fn merge_content(mut parts: Vec<OpenAiContentPart>) -> Option<OpenAiContent> {
    match parts.len() {
        0 => None,
        1 => match parts.pop() {
            Some(OpenAiContentPart::Text { text }) => Some(OpenAiContent::Text(text)),
            other => Some(OpenAiContent::Parts(other.into_iter().collect())),
        },
        _ => Some(OpenAiContent::Parts(parts)),
    }
}

fn inline_data_part(role: &str, blob: &Blob) -> Result<OpenAiContentPart, ModelError> {
    if blob.mime_type.starts_with("text/") {
        let text = std::str::from_utf8(&blob.data)
            .map_err(|_| ModelError::Translation(format!("inline {} data is not valid UTF-8", blob.mime_type)))?;
        return Ok(OpenAiContentPart::Text { text: text.to_owned() });
    }

    if role == "user" && blob.mime_type.starts_with("image/") {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&blob.data);
        return Ok(OpenAiContentPart::ImageUrl {
            image_url: OpenAiImageUrl {
                url: format!("data:{};base64,{encoded}", blob.mime_type),
            },
        });
    }

    Err(ModelError::Translation(format!(
        "inline data of type {} cannot be sent in a {role} message",
        blob.mime_type
    )))
}

fn system_messages(instruction: &Turn) -> impl Iterator<Item = OpenAiMessage> + '_ {
    instruction
        .parts
        .iter()
        .filter_map(Part::as_text)
        .filter(|text| !text.is_empty())
        .map(|text| OpenAiMessage::text("system", text))
}

fn tool_call_to_openai(call: &FunctionCall) -> OpenAiToolCall {
    OpenAiToolCall {
        id: call.id.clone().unwrap_or_else(|| call.name.clone()),
        tool_type: FUNCTION_TYPE.to_owned(),
        function: OpenAiFunctionCall {
            name: call.name.clone(),
            arguments: Value::Object(call.args.clone()).to_string(),
        },
    }
}

fn tool_result_message(response: &FunctionResponse) -> OpenAiMessage {
    OpenAiMessage {
        tool_call_id: Some(response.call_id().to_owned()),
        ..OpenAiMessage::text("tool", Value::Object(response.response.clone()).to_string())
    }
}

fn tool_to_openai(declaration: &ToolDeclaration) -> OpenAiTool {
    OpenAiTool {
        tool_type: FUNCTION_TYPE.to_owned(),
        function: OpenAiFunction {
            name: declaration.name.clone(),
            description: (!declaration.description.is_empty()).then(|| declaration.description.clone()),
            parameters: Some(declaration.parameters.clone()),
        },
    }
}

// -- Inbound: chat completion response -> canonical event --

/// Translate a batch response into exactly one event
///
/// Only the first choice is read. A response without choices becomes the
/// content-less unknown-error sentinel.
pub fn from_openai_response(response: OpenAiResponse) -> ResponseEvent {
    let usage = response.usage.as_ref().map(usage_metadata);

    let Some(choice) = response.choices.into_iter().next() else {
        return ResponseEvent {
            usage,
            ..ResponseEvent::error(UNKNOWN_ERROR_CODE, UNKNOWN_ERROR_MESSAGE)
        };
    };

    let mut parts = Vec::new();
    if let Some(text) = choice.message.content.filter(|text| !text.is_empty()) {
        parts.push(Part::Text(text));
    }

    let mut malformed = Vec::new();
    for call in choice.message.tool_calls.unwrap_or_default() {
        match function_call_part(Some(call.id), call.function.name, &call.function.arguments) {
            Ok(part) => parts.push(part),
            Err(message) => malformed.push(message),
        }
    }

    let mut event = ResponseEvent {
        content: Some(Turn::model(parts)),
        usage,
        finish_reason: Some(finish_reason(choice.finish_reason.as_deref().unwrap_or_default())),
        turn_complete: true,
        ..ResponseEvent::default()
    };
    flag_malformed_calls(&mut event, &malformed);

    event
}

/// Build a function-call part from a wire tool call
///
/// An empty argument string means no arguments. Anything that is not a JSON
/// object is rejected with a description of the problem.
pub(crate) fn function_call_part(id: Option<String>, name: String, arguments: &str) -> Result<Part, String> {
    let args = if arguments.trim().is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(arguments) {
            Ok(Value::Object(args)) => args,
            Ok(_) => return Err(malformed_call(&name, "arguments are not a JSON object")),
            Err(e) => return Err(malformed_call(&name, &e.to_string())),
        }
    };

    Ok(Part::FunctionCall(FunctionCall { id, name, args }))
}

fn malformed_call(name: &str, reason: &str) -> String {
    tracing::warn!(function = %name, reason = %reason, "malformed tool call arguments");
    format!("malformed arguments for function `{name}`: {reason}")
}

pub(crate) fn flag_malformed_calls(event: &mut ResponseEvent, malformed: &[String]) {
    if !malformed.is_empty() {
        event.error_code = Some(MALFORMED_FUNCTION_CALL_CODE.to_owned());
        event.error_message = Some(malformed.join("; "));
    }
}

/// Map wire token counts onto canonical usage
pub fn usage_metadata(usage: &OpenAiUsage) -> UsageMetadata {
    UsageMetadata {
        prompt_token_count: usage.prompt_tokens,
        candidates_token_count: usage.completion_tokens,
        total_token_count: usage.total_tokens,
        thoughts_token_count: usage.completion_tokens_details.map_or(0, |d| d.reasoning_tokens),
    }
}

/// Map a wire finish reason onto the canonical enum
///
/// Tool-call completions count as a normal stop. Unknown values also map to
/// `Stop`.
pub fn finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::MaxTokens,
        "content_filter" => FinishReason::Safety,
        _ => FinishReason::Stop,
    }
}
