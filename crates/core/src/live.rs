//! Provider-neutral types exchanged with a live agent runtime.
//!
//! The bridge speaks only in these types: it pushes [`LiveRequest`]s into a
//! session and reads [`AgentEvent`]s back out. Concrete runtimes (see the
//! `gemini-live` crate) translate them to and from their own wire format.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output medium negotiated for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Audio,
}

/// Run configuration fixed at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    pub response_modality: Modality,
    pub voice: String,
    /// Only set for audio sessions; text sessions leave language to the model.
    pub language_code: Option<String>,
    pub input_transcription: bool,
    pub output_transcription: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// Raw binary payload with its mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineData(Blob),
}

/// A role-tagged sequence of parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn user_blob(blob: Blob) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::InlineData(blob)],
        }
    }
}

/// A request primitive pushed into a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveRequest {
    /// A complete conversational turn.
    Content(Content),
    /// A realtime media chunk (microphone audio).
    Realtime(Blob),
}

/// A tool invocation requested by the agent.
///
/// `args` is kept as the agent produced it; consumers decide how to treat
/// a non-object value.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: Option<String>,
    pub name: String,
    pub args: Value,
}

/// The value a tool returned to the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

/// A speech-to-text fragment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transcription {
    pub text: Option<String>,
    pub partial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u32>,
    pub candidates_token_count: Option<u32>,
    pub total_token_count: Option<u32>,
}

/// One piece of an [`AgentEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventPart {
    Content(Content),
    InputTranscription(Transcription),
    OutputTranscription(Transcription),
    ToolCalls(Vec<ToolInvocation>),
    ToolResults(Vec<ToolResult>),
    TurnComplete,
    Usage(UsageMetadata),
    /// Something the runtime received but has no mapping for.
    Unrecognized(String),
}

/// A single event emitted by the agent runtime.
///
/// An event may carry several parts (e.g. text followed by a tool call);
/// the parts keep the order in which the runtime produced them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentEvent {
    pub parts: Vec<EventPart>,
}

impl AgentEvent {
    pub fn new(parts: Vec<EventPart>) -> Self {
        Self { parts }
    }

    pub fn single(part: EventPart) -> Self {
        Self { parts: vec![part] }
    }

    /// Returns true if this event reports a result for the named tool.
    pub fn has_tool_result(&self, name: &str) -> bool {
        self.parts.iter().any(|part| match part {
            EventPart::ToolResults(results) => results.iter().any(|r| r.name == name),
            _ => false,
        })
    }
}

/// Errors surfaced by a live agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("failed to connect to agent runtime: {0}")]
    Connect(String),
    #[error("agent runtime protocol error: {0}")]
    Protocol(String),
    #[error("agent runtime transport error: {0}")]
    Transport(String),
    #[error("agent runtime closed the session: {0}")]
    Closed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_has_tool_result_matches_by_name() {
        let event = AgentEvent::new(vec![
            EventPart::Content(Content::user_text("hi")),
            EventPart::ToolResults(vec![ToolResult {
                id: None,
                name: "save_call_summary".into(),
                response: json!({"status": "success"}),
            }]),
        ]);
        assert!(event.has_tool_result("save_call_summary"));
        assert!(!event.has_tool_result("update_dashboard"));
    }

    #[test]
    fn test_tool_call_is_not_a_tool_result() {
        let event = AgentEvent::single(EventPart::ToolCalls(vec![ToolInvocation {
            id: Some("1".into()),
            name: "save_call_summary".into(),
            args: json!({}),
        }]));
        assert!(!event.has_tool_result("save_call_summary"));
    }

    #[test]
    fn test_modality_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Modality::Text).unwrap(), "\"TEXT\"");
        assert_eq!(serde_json::to_string(&Modality::Audio).unwrap(), "\"AUDIO\"");
    }
}
