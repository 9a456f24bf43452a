//! Event Translator
//!
//! Maps one agent event to the client messages it produces. The mapping is
//! total: every event translates, unexpected shapes are coerced, and parts
//! with no client counterpart are dropped.
//!
//! Tool calls and tool results are not special here. They are forwarded like
//! any other part, which is how coaching data reaches the dashboard.

use super::protocol::{ServerMessage, TranscriptSource};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use coach_core::live::{
    AgentEvent, Content, EventPart, Part, ToolInvocation, ToolResult, Transcription,
    UsageMetadata,
};
use serde_json::{Map, Value};
use tracing::debug;

pub fn translate(event: AgentEvent) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    for part in event.parts {
        match part {
            EventPart::Content(content) => content_messages(content, &mut messages),
            EventPart::InputTranscription(t) => {
                messages.push(transcript(t, TranscriptSource::Input))
            }
            EventPart::OutputTranscription(t) => {
                messages.push(transcript(t, TranscriptSource::Output))
            }
            EventPart::ToolCalls(calls) => messages.extend(calls.into_iter().map(tool_call)),
            EventPart::ToolResults(results) => {
                messages.extend(results.into_iter().map(tool_result))
            }
            EventPart::TurnComplete => messages.push(ServerMessage::TurnComplete),
            EventPart::Usage(usage) => messages.push(usage_message(usage)),
            EventPart::Unrecognized(kind) => debug!(%kind, "No client message for agent event"),
        }
    }
    messages
}

fn content_messages(content: Content, messages: &mut Vec<ServerMessage>) {
    for part in content.parts {
        match part {
            Part::InlineData(blob) if blob.mime_type.contains("audio") && !blob.data.is_empty() => {
                messages.push(ServerMessage::Audio {
                    data: BASE64.encode(&blob.data),
                    mime_type: blob.mime_type,
                });
            }
            Part::InlineData(_) => {}
            Part::Text(text) if !text.is_empty() => messages.push(ServerMessage::Text { text }),
            Part::Text(_) => {}
        }
    }
}

fn transcript(transcription: Transcription, source: TranscriptSource) -> ServerMessage {
    ServerMessage::Transcript {
        text: transcription.text.unwrap_or_default(),
        source,
        partial: transcription.partial,
    }
}

fn tool_call(call: ToolInvocation) -> ServerMessage {
    let args = match call.args {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    ServerMessage::ToolCall {
        name: call.name,
        args,
    }
}

fn tool_result(result: ToolResult) -> ServerMessage {
    let data = match result.response {
        Value::Object(map) => Value::Object(map),
        Value::String(text) => Value::String(text),
        other => Value::String(other.to_string()),
    };
    ServerMessage::ToolResult {
        name: result.name,
        data,
    }
}

fn usage_message(usage: UsageMetadata) -> ServerMessage {
    ServerMessage::Usage {
        prompt_tokens: usage.prompt_token_count.unwrap_or(0),
        candidates_tokens: usage.candidates_token_count.unwrap_or(0),
        total_tokens: usage.total_token_count.unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::live::{Blob, Role};
    use serde_json::json;

    fn model(parts: Vec<Part>) -> EventPart {
        EventPart::Content(Content {
            role: Role::Model,
            parts,
        })
    }

    #[test]
    fn test_text_then_tool_call_from_one_event_keep_order() {
        let event = AgentEvent::new(vec![
            model(vec![Part::Text("Ask about their budget".into())]),
            EventPart::ToolCalls(vec![ToolInvocation {
                id: Some("c1".into()),
                name: "update_dashboard".into(),
                args: json!({"coaching_tip": "Ask about their budget"}),
            }]),
        ]);
        let messages = translate(event);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            ServerMessage::Text {
                text: "Ask about their budget".into()
            }
        );
        match &messages[1] {
            ServerMessage::ToolCall { name, args } => {
                assert_eq!(name, "update_dashboard");
                assert_eq!(args["coaching_tip"], "Ask about their budget");
            }
            other => panic!("expected tool_call, got {other:?}"),
        }
    }

    #[test]
    fn test_non_object_tool_args_become_empty_mapping() {
        for args in [json!(null), json!("oops"), json!([1, 2]), json!(3)] {
            let messages = translate(AgentEvent::single(EventPart::ToolCalls(vec![
                ToolInvocation {
                    id: None,
                    name: "log_objection".into(),
                    args,
                },
            ])));
            assert_eq!(
                messages,
                vec![ServerMessage::ToolCall {
                    name: "log_objection".into(),
                    args: Map::new()
                }]
            );
        }
    }

    #[test]
    fn test_tool_results_keep_objects_and_stringify_the_rest() {
        let result = |response| ToolResult {
            id: None,
            name: "save_call_summary".into(),
            response,
        };
        let messages = translate(AgentEvent::single(EventPart::ToolResults(vec![
            result(json!({"status": "success"})),
            result(json!("saved")),
            result(json!(42)),
            result(json!(null)),
        ])));
        let data: Vec<_> = messages
            .into_iter()
            .map(|m| match m {
                ServerMessage::ToolResult { data, .. } => data,
                other => panic!("expected tool_result, got {other:?}"),
            })
            .collect();
        assert_eq!(
            data,
            vec![json!({"status": "success"}), json!("saved"), json!("42"), json!("null")]
        );
    }

    #[test]
    fn test_only_non_empty_audio_blobs_are_forwarded() {
        let blob = |mime: &str, data: &[u8]| {
            Part::InlineData(Blob {
                mime_type: mime.into(),
                data: data.to_vec().into(),
            })
        };
        let messages = translate(AgentEvent::single(model(vec![
            blob("audio/pcm;rate=24000", &[1, 2, 3]),
            blob("audio/pcm;rate=24000", &[]),
            blob("image/png", &[9]),
            Part::Text(String::new()),
        ])));
        assert_eq!(
            messages,
            vec![ServerMessage::Audio {
                data: "AQID".into(),
                mime_type: "audio/pcm;rate=24000".into()
            }]
        );
    }

    #[test]
    fn test_missing_transcript_text_is_empty_not_dropped() {
        let messages = translate(AgentEvent::new(vec![
            EventPart::InputTranscription(Transcription {
                text: None,
                partial: false,
            }),
            EventPart::OutputTranscription(Transcription {
                text: Some("We're fine".into()),
                partial: true,
            }),
        ]));
        assert_eq!(
            messages,
            vec![
                ServerMessage::Transcript {
                    text: String::new(),
                    source: TranscriptSource::Input,
                    partial: false
                },
                ServerMessage::Transcript {
                    text: "We're fine".into(),
                    source: TranscriptSource::Output,
                    partial: true
                },
            ]
        );
    }

    #[test]
    fn test_usage_defaults_missing_counts_to_zero() {
        let messages = translate(AgentEvent::single(EventPart::Usage(UsageMetadata {
            prompt_token_count: Some(12),
            ..Default::default()
        })));
        assert_eq!(
            messages,
            vec![ServerMessage::Usage {
                prompt_tokens: 12,
                candidates_tokens: 0,
                total_tokens: 0
            }]
        );
    }

    #[test]
    fn test_turn_complete_and_unrecognized_parts() {
        let messages = translate(AgentEvent::new(vec![
            EventPart::Unrecognized("goAway".into()),
            EventPart::TurnComplete,
        ]));
        assert_eq!(messages, vec![ServerMessage::TurnComplete]);
    }
}
