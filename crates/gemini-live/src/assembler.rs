use crate::types::{ServerContent, ServerMessage, WireContent, WireTranscription, WireUsage};
use coach_core::live::{AgentEvent, Content, EventPart, Part, Transcription, UsageMetadata};
use tracing::{debug, warn};

/// Turns Gemini server messages into [`AgentEvent`]s.
///
/// Transcription arrives as a trickle of fragments. Each fragment is surfaced
/// as a partial transcript; once the server marks it finished (or the turn
/// completes) a final transcript with the aggregated text follows.
#[derive(Debug, Default)]
pub(crate) struct EventAssembler {
    input: String,
    output: String,
}

#[derive(Clone, Copy)]
enum Direction {
    Input,
    Output,
}

impl EventAssembler {
    /// Assembles everything except tool calls, which the session executes itself.
    pub fn assemble(&mut self, msg: &ServerMessage) -> Option<AgentEvent> {
        let mut parts = Vec::new();

        if let Some(content) = &msg.server_content {
            self.server_content(content, &mut parts);
        }
        if let Some(usage) = msg.usage_metadata {
            parts.push(EventPart::Usage(usage_metadata(usage)));
        }
        if let Some(cancellation) = &msg.tool_call_cancellation {
            debug!(ids = ?cancellation.ids, "Gemini cancelled tool calls");
            parts.push(EventPart::Unrecognized("toolCallCancellation".into()));
        }
        if let Some(go_away) = &msg.go_away {
            warn!(time_left = ?go_away.time_left, "Gemini announced session shutdown");
            parts.push(EventPart::Unrecognized("goAway".into()));
        }

        (!parts.is_empty()).then(|| AgentEvent::new(parts))
    }

    fn server_content(&mut self, content: &ServerContent, parts: &mut Vec<EventPart>) {
        if let Some(turn) = &content.model_turn {
            if let Some(converted) = model_content(turn) {
                parts.push(EventPart::Content(converted));
            }
        }
        if let Some(fragment) = &content.input_transcription {
            self.transcription(Direction::Input, fragment, parts);
        }
        if let Some(fragment) = &content.output_transcription {
            self.transcription(Direction::Output, fragment, parts);
        }
        if content.interrupted == Some(true) {
            debug!("Model output interrupted");
            self.flush(Direction::Output, parts);
        }
        if content.turn_complete == Some(true) {
            self.flush(Direction::Input, parts);
            self.flush(Direction::Output, parts);
            parts.push(EventPart::TurnComplete);
        }
    }

    fn transcription(
        &mut self,
        direction: Direction,
        fragment: &WireTranscription,
        parts: &mut Vec<EventPart>,
    ) {
        if let Some(text) = fragment.text.as_deref().filter(|t| !t.is_empty()) {
            self.buffer(direction).push_str(text);
            parts.push(part(
                direction,
                Transcription {
                    text: Some(text.to_string()),
                    partial: true,
                },
            ));
        }
        if fragment.finished == Some(true) {
            let text = std::mem::take(self.buffer(direction));
            parts.push(part(
                direction,
                Transcription {
                    text: (!text.is_empty()).then_some(text),
                    partial: false,
                },
            ));
        }
    }

    /// Emits a final transcript for any text still buffered.
    fn flush(&mut self, direction: Direction, parts: &mut Vec<EventPart>) {
        let buffer = self.buffer(direction);
        if buffer.is_empty() {
            return;
        }
        let text = std::mem::take(buffer);
        parts.push(part(
            direction,
            Transcription {
                text: Some(text),
                partial: false,
            },
        ));
    }

    fn buffer(&mut self, direction: Direction) -> &mut String {
        match direction {
            Direction::Input => &mut self.input,
            Direction::Output => &mut self.output,
        }
    }
}

fn part(direction: Direction, transcription: Transcription) -> EventPart {
    match direction {
        Direction::Input => EventPart::InputTranscription(transcription),
        Direction::Output => EventPart::OutputTranscription(transcription),
    }
}

fn model_content(turn: &WireContent) -> Option<Content> {
    let mut parts = Vec::with_capacity(turn.parts.len());
    for wire in &turn.parts {
        if wire.thought == Some(true) {
            continue;
        }
        if let Some(text) = &wire.text {
            parts.push(Part::Text(text.clone()));
        }
        if let Some(blob) = &wire.inline_data {
            match blob.decode() {
                Ok(blob) => parts.push(Part::InlineData(blob)),
                Err(e) => warn!(mime_type = %blob.mime_type, error = %e, "Dropping undecodable inline data"),
            }
        }
    }
    (!parts.is_empty()).then(|| Content {
        role: turn.role(),
        parts,
    })
}

fn usage_metadata(usage: WireUsage) -> UsageMetadata {
    UsageMetadata {
        prompt_token_count: usage.prompt_token_count,
        candidates_token_count: usage.response_token_count,
        total_token_count: usage.total_token_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::live::Role;
    use serde_json::json;

    fn message(value: serde_json::Value) -> ServerMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_model_turn_keeps_part_order_and_skips_thoughts() {
        let mut assembler = EventAssembler::default();
        let event = assembler
            .assemble(&message(json!({"serverContent": {"modelTurn": {"parts": [
                {"text": "planning...", "thought": true},
                {"text": "Ask about budget"},
                {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AQI="}}
            ]}}})))
            .unwrap();

        let [EventPart::Content(content)] = event.parts.as_slice() else {
            panic!("expected a single content part, got {:?}", event.parts);
        };
        assert_eq!(content.role, Role::Model);
        assert_eq!(content.parts[0], Part::Text("Ask about budget".into()));
        match &content.parts[1] {
            Part::InlineData(blob) => assert_eq!(&blob.data[..], &[1u8, 2]),
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn test_transcription_fragments_then_final_aggregate() {
        let mut assembler = EventAssembler::default();
        let first = assembler
            .assemble(&message(json!({"serverContent": {"inputTranscription": {"text": "too "}}})))
            .unwrap();
        assert_eq!(
            first.parts,
            vec![EventPart::InputTranscription(Transcription {
                text: Some("too ".into()),
                partial: true
            })]
        );

        let last = assembler
            .assemble(&message(json!({"serverContent": {"inputTranscription": {"text": "expensive", "finished": true}}})))
            .unwrap();
        assert_eq!(
            last.parts,
            vec![
                EventPart::InputTranscription(Transcription {
                    text: Some("expensive".into()),
                    partial: true
                }),
                EventPart::InputTranscription(Transcription {
                    text: Some("too expensive".into()),
                    partial: false
                }),
            ]
        );
    }

    #[test]
    fn test_turn_complete_flushes_pending_output_transcript() {
        let mut assembler = EventAssembler::default();
        assembler.assemble(&message(json!({"serverContent": {"outputTranscription": {"text": "We're happy"}}})));
        let event = assembler
            .assemble(&message(json!({"serverContent": {"turnComplete": true}})))
            .unwrap();
        assert_eq!(
            event.parts,
            vec![
                EventPart::OutputTranscription(Transcription {
                    text: Some("We're happy".into()),
                    partial: false
                }),
                EventPart::TurnComplete,
            ]
        );
    }

    #[test]
    fn test_usage_maps_response_tokens_to_candidates() {
        let mut assembler = EventAssembler::default();
        let event = assembler
            .assemble(&message(json!({"usageMetadata": {"promptTokenCount": 3, "responseTokenCount": 4}})))
            .unwrap();
        assert_eq!(
            event.parts,
            vec![EventPart::Usage(UsageMetadata {
                prompt_token_count: Some(3),
                candidates_token_count: Some(4),
                total_token_count: None,
            })]
        );
    }

    #[test]
    fn test_setup_complete_alone_yields_nothing() {
        let mut assembler = EventAssembler::default();
        assert!(assembler.assemble(&message(json!({"setupComplete": {}}))).is_none());
    }
}
