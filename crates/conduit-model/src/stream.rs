//! Streaming response translation
//!
//! Provider chunks are pulled lazily and mapped to [`ResponseEvent`]s one at
//! a time. Dropping the returned stream drops the underlying HTTP body, so an
//! early exit releases the connection just like natural exhaustion does.

use std::collections::BTreeMap;
use std::pin::Pin;

use futures_util::{Stream, StreamExt, future, stream};
use tokio_util::sync::CancellationToken;

use crate::ModelError;
use crate::convert::openai::{finish_reason, flag_malformed_calls, function_call_part, usage_metadata};
use crate::protocol::openai::{OpenAiStreamChunk, OpenAiStreamToolCall};
use crate::provider::ChunkStream;
use crate::types::{Part, ResponseEvent, Turn, UNKNOWN_ERROR_CODE, UNKNOWN_ERROR_MESSAGE};

/// Lazy, finite sequence of response events
pub type ResponseStream = Pin<Box<dyn Stream<Item = ResponseEvent> + Send>>;

/// Stateful translator for the chunks of one streamed turn
///
/// Tool-call fragments are accumulated by index and released on the chunk
/// that carries the finish reason.
#[derive(Debug, Default)]
pub struct ChunkTranslator {
    pending_calls: BTreeMap<u32, PendingCall>,
}

#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl ChunkTranslator {
    /// Translate one chunk, `None` when the chunk carries nothing to report
    pub fn translate(&mut self, chunk: &OpenAiStreamChunk) -> Option<ResponseEvent> {
        let Some(choice) = chunk.choices.first() else {
            let Some(usage) = &chunk.usage else {
                tracing::debug!(chunk = %chunk.id, "suppressing chunk without choices or usage");
                return None;
            };

            return Some(ResponseEvent {
                usage: Some(usage_metadata(usage)),
                turn_complete: true,
                ..ResponseEvent::default()
            });
        };

        for fragment in choice.delta.tool_calls.iter().flatten() {
            self.absorb(fragment);
        }

        let text = choice.delta.content.as_deref().filter(|text| !text.is_empty());

        let Some(reason) = choice.finish_reason.as_deref().filter(|reason| !reason.is_empty()) else {
            return text.map(|text| ResponseEvent {
                content: Some(Turn::model(vec![Part::text(text)])),
                partial: true,
                ..ResponseEvent::default()
            });
        };

        let mut parts: Vec<Part> = text.map(Part::text).into_iter().collect();
        let mut malformed = Vec::new();

        for call in std::mem::take(&mut self.pending_calls).into_values() {
            match function_call_part(call.id, call.name, &call.arguments) {
                Ok(part) => parts.push(part),
                Err(message) => malformed.push(message),
            }
        }

        let mut event = ResponseEvent {
            content: Some(Turn::model(parts)),
            usage: chunk.usage.as_ref().map(usage_metadata),
            finish_reason: Some(finish_reason(reason)),
            partial: false,
            turn_complete: true,
            ..ResponseEvent::default()
        };
        flag_malformed_calls(&mut event, &malformed);

        Some(event)
    }

    fn absorb(&mut self, fragment: &OpenAiStreamToolCall) {
        let pending = self.pending_calls.entry(fragment.index).or_default();

        if let Some(id) = &fragment.id {
            pending.id = Some(id.clone());
        }

        if let Some(function) = &fragment.function {
            if let Some(name) = &function.name {
                pending.name.push_str(name);
            }
            if let Some(arguments) = &function.arguments {
                pending.arguments.push_str(arguments);
            }
        }
    }
}

/// Map a provider chunk stream to response events
///
/// A chunk error, or a chunk reporting an in-band provider error, is turned
/// into one content-less event and ends the stream. Cancelling `cancel` ends
/// the stream at the next poll with a final `CANCELLED` event.
pub fn translate_stream(chunks: ChunkStream, cancel: CancellationToken) -> ResponseStream {
    let cancelled = cancel.clone();

    let events = chunks
        .scan((ChunkTranslator::default(), false), |(translator, failed), item| {
            if *failed {
                return future::ready(None);
            }

            let event = match item {
                Ok(OpenAiStreamChunk { error: Some(error), .. }) => {
                    tracing::error!(upstream = %error.message, "provider reported an error mid-stream");
                    *failed = true;
                    let message = if error.message.is_empty() {
                        UNKNOWN_ERROR_MESSAGE.to_owned()
                    } else {
                        error.message
                    };
                    Some(ResponseEvent::error(UNKNOWN_ERROR_CODE, message))
                }
                Ok(chunk) => translator.translate(&chunk),
                Err(error) => {
                    tracing::error!(error = %error, "response stream failed");
                    *failed = true;
                    Some(ResponseEvent::from(&error))
                }
            };

            future::ready(Some(event))
        })
        .filter_map(future::ready)
        .take_until(cancel.cancelled_owned())
        .chain(
            stream::once(async move {
                cancelled.is_cancelled().then(|| {
                    tracing::debug!("response stream cancelled");
                    ResponseEvent::from(&ModelError::Cancelled)
                })
            })
            .filter_map(future::ready),
        );

    Box::pin(events)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::convert::openai::from_openai_response;
    use crate::protocol::openai::{
        OpenAiChoice, OpenAiChoiceMessage, OpenAiErrorDetail, OpenAiResponse, OpenAiStreamChoice, OpenAiStreamDelta,
        OpenAiStreamFunctionCall, OpenAiUsage,
    };
    use crate::types::{CANCELLED_CODE, FinishReason, MALFORMED_FUNCTION_CALL_CODE, STREAM_ERROR_CODE, UsageMetadata};

    fn text_chunk(text: &str, finish: Option<&str>) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            id: "chunk".to_owned(),
            choices: vec![OpenAiStreamChoice {
                index: 0,
                delta: OpenAiStreamDelta {
                    content: Some(text.to_owned()),
                    ..OpenAiStreamDelta::default()
                },
                finish_reason: finish.map(str::to_owned),
            }],
            ..OpenAiStreamChunk::default()
        }
    }

    fn usage_chunk(prompt: u32, completion: u32) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            usage: Some(OpenAiUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
                completion_tokens_details: None,
            }),
            ..OpenAiStreamChunk::default()
        }
    }

    fn tool_chunk(index: u32, id: Option<&str>, name: Option<&str>, arguments: &str) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            choices: vec![OpenAiStreamChoice {
                delta: OpenAiStreamDelta {
                    tool_calls: Some(vec![OpenAiStreamToolCall {
                        index,
                        id: id.map(str::to_owned),
                        function: Some(OpenAiStreamFunctionCall {
                            name: name.map(str::to_owned),
                            arguments: Some(arguments.to_owned()),
                        }),
                    }]),
                    ..OpenAiStreamDelta::default()
                },
                ..OpenAiStreamChoice::default()
            }],
            ..OpenAiStreamChunk::default()
        }
    }

    fn finish_chunk(reason: &str) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            choices: vec![OpenAiStreamChoice {
                finish_reason: Some(reason.to_owned()),
                ..OpenAiStreamChoice::default()
            }],
            ..OpenAiStreamChunk::default()
        }
    }

    fn chunk_stream(chunks: Vec<Result<OpenAiStreamChunk, ModelError>>) -> ChunkStream {
        Box::pin(stream::iter(chunks))
    }

    async fn collect(chunks: Vec<Result<OpenAiStreamChunk, ModelError>>) -> Vec<ResponseEvent> {
        translate_stream(chunk_stream(chunks), CancellationToken::new())
            .collect()
            .await
    }

    #[tokio::test]
    async fn partial_terminal_and_usage_events() {
        let events = collect(vec![
            Ok(text_chunk("Hel", None)),
            Ok(text_chunk("lo", Some("length"))),
            Ok(usage_chunk(5, 2)),
        ])
        .await;

        assert_eq!(events.len(), 3);

        assert!(events[0].partial);
        assert_eq!(events[0].text(), "Hel");
        assert_eq!(events[0].finish_reason, None);
        assert!(!events[0].turn_complete);

        assert!(!events[1].partial);
        assert!(events[1].turn_complete);
        assert_eq!(events[1].text(), "lo");
        assert_eq!(events[1].finish_reason, Some(FinishReason::MaxTokens));
        assert_eq!(events[1].usage, None);

        assert!(events[2].turn_complete);
        assert!(events[2].content.is_none());
        assert_eq!(events[2].finish_reason, None);
        assert_eq!(events[2].usage.unwrap().total_token_count, 7);
    }

    #[tokio::test]
    async fn partial_events_never_carry_finish_reason() {
        let sequences = vec![
            vec![text_chunk("a", None), text_chunk("b", None), text_chunk("c", Some("stop"))],
            vec![text_chunk("", None), text_chunk("x", None), text_chunk("", Some("content_filter"))],
            vec![OpenAiStreamChunk::default(), text_chunk("only", Some("stop")), usage_chunk(1, 1)],
        ];

        for chunks in sequences {
            let events = collect(chunks.into_iter().map(Ok).collect()).await;

            let finished: Vec<_> = events.iter().filter(|e| e.finish_reason.is_some()).collect();
            assert_eq!(finished.len(), 1);
            assert!(!finished[0].partial);
            assert!(finished[0].turn_complete);

            for event in events.iter().filter(|e| e.partial) {
                assert_eq!(event.finish_reason, None);
                assert!(!event.turn_complete);
            }

            let last_content = events.iter().rposition(|e| e.content.is_some()).unwrap();
            assert!(events[last_content].finish_reason.is_some());
        }
    }

    #[tokio::test]
    async fn empty_chunks_are_suppressed() {
        let events = collect(vec![Ok(OpenAiStreamChunk::default()), Ok(text_chunk("", None))]).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn tool_call_fragments_attach_to_terminal_event() {
        let events = collect(vec![
            Ok(tool_chunk(0, Some("call_a"), Some("get_weather"), "{\"ci")),
            Ok(tool_chunk(1, Some("call_b"), Some("get_time"), "")),
            Ok(tool_chunk(0, None, None, "ty\":\"Paris\"}")),
            Ok(finish_chunk("tool_calls")),
        ])
        .await;

        assert_eq!(events.len(), 1);
        let terminal = &events[0];
        assert_eq!(terminal.finish_reason, Some(FinishReason::Stop));

        let calls: Vec<_> = terminal.content.as_ref().unwrap().function_calls().cloned().collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id.as_deref(), Some("call_a"));
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].args["city"], "Paris");
        assert_eq!(calls[1].name, "get_time");
        assert!(calls[1].args.is_empty());
    }

    #[tokio::test]
    async fn malformed_streamed_arguments_are_flagged() {
        let events = collect(vec![
            Ok(tool_chunk(0, Some("call_a"), Some("lookup"), "{\"q\": ")),
            Ok(finish_chunk("tool_calls")),
        ])
        .await;

        assert_eq!(events[0].error_code.as_deref(), Some(MALFORMED_FUNCTION_CALL_CODE));
        assert_eq!(events[0].content.as_ref().unwrap().function_calls().count(), 0);
    }

    #[tokio::test]
    async fn error_is_the_final_element() {
        let events = collect(vec![
            Ok(text_chunk("Hel", None)),
            Err(ModelError::Streaming("connection reset".to_owned())),
            Ok(text_chunk("lo", Some("stop"))),
        ])
        .await;

        assert_eq!(events.len(), 2);
        let last = &events[1];
        assert!(last.content.is_none());
        assert_eq!(last.error_code.as_deref(), Some(STREAM_ERROR_CODE));
        assert!(last.error_message.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn in_band_provider_error_ends_the_stream() {
        let failure = OpenAiStreamChunk {
            error: Some(OpenAiErrorDetail {
                message: "rate limited".to_owned(),
                ..OpenAiErrorDetail::default()
            }),
            ..OpenAiStreamChunk::default()
        };

        let events = collect(vec![Ok(text_chunk("Hel", None)), Ok(failure), Ok(text_chunk("lo", Some("stop")))]).await;

        assert_eq!(events.len(), 2);
        assert!(events[0].partial);
        let last = &events[1];
        assert!(last.content.is_none());
        assert_eq!(last.error_code.as_deref(), Some(UNKNOWN_ERROR_CODE));
        assert_eq!(last.error_message.as_deref(), Some("rate limited"));
    }

    #[test]
    fn error_payload_parses_into_a_chunk() {
        let chunk: OpenAiStreamChunk =
            serde_json::from_str(r#"{"error":{"message":"rate limited","type":"requests"}}"#).unwrap();

        let error = chunk.error.unwrap();
        assert_eq!(error.message, "rate limited");
        assert_eq!(error.error_type.as_deref(), Some("requests"));
        assert!(chunk.choices.is_empty());
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn guarded(chunks: Vec<OpenAiStreamChunk>, released: &Arc<AtomicBool>) -> ChunkStream {
        let guard = DropFlag(Arc::clone(released));
        Box::pin(stream::iter(chunks).map(move |chunk| {
            let _held = &guard;
            Ok(chunk)
        }))
    }

    #[tokio::test]
    async fn early_drop_releases_source() {
        let released = Arc::new(AtomicBool::new(false));
        let chunks = vec![text_chunk("a", None), text_chunk("b", None), text_chunk("c", Some("stop"))];

        let mut events = translate_stream(guarded(chunks, &released), CancellationToken::new());
        let first = events.next().await.unwrap();
        assert_eq!(first.text(), "a");
        assert!(!released.load(Ordering::SeqCst));

        drop(events);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancellation_ends_the_stream_with_a_cancelled_event() {
        let released = Arc::new(AtomicBool::new(false));
        let chunks = vec![text_chunk("a", None), text_chunk("b", None), text_chunk("c", Some("stop"))];
        let cancel = CancellationToken::new();

        let mut events = translate_stream(guarded(chunks, &released), cancel.clone());
        assert_eq!(events.next().await.unwrap().text(), "a");

        cancel.cancel();
        let last = events.next().await.unwrap();
        assert!(last.content.is_none());
        assert_eq!(last.error_code.as_deref(), Some(CANCELLED_CODE));
        assert!(events.next().await.is_none());

        drop(events);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancelled_before_start_yields_only_the_cancelled_event() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let events: Vec<_> = translate_stream(chunk_stream(vec![Ok(text_chunk("a", None))]), cancel)
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].error_code.as_deref(), Some(CANCELLED_CODE));
    }

    #[tokio::test]
    async fn natural_end_has_no_cancelled_event() {
        let events = collect(vec![Ok(text_chunk("done", Some("stop")))]).await;

        assert_eq!(events.len(), 1);
        assert!(!events[0].is_error());
    }

    #[tokio::test]
    async fn streamed_usage_matches_batch_usage() {
        let chunks = vec![
            text_chunk("Hel", None),
            text_chunk("lo", Some("stop")),
            usage_chunk(11, 4),
        ];
        let streamed = collect(chunks.into_iter().map(Ok).collect()).await;

        let mut total = UsageMetadata::default();
        for usage in streamed.iter().filter_map(|e| e.usage) {
            total += usage;
        }

        let batch = from_openai_response(OpenAiResponse {
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiChoiceMessage {
                    role: "assistant".to_owned(),
                    content: Some("Hello".to_owned()),
                    tool_calls: None,
                },
                finish_reason: Some("stop".to_owned()),
            }],
            usage: Some(OpenAiUsage {
                prompt_tokens: 11,
                completion_tokens: 4,
                total_tokens: 15,
                completion_tokens_details: None,
            }),
            ..OpenAiResponse::default()
        });

        assert_eq!(Some(total), batch.usage);
        let streamed_text: String = streamed.iter().map(ResponseEvent::text).collect();
        assert_eq!(streamed_text, batch.text());
    }
}
