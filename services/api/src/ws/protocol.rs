//! Defines the WebSocket message protocol between the browser client and the API server.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Frames sent from the client (browser) to the server.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Picks the session mode. Only honored as the very first frame.
    Config {
        mode: Option<String>,
        voice: Option<String>,
        persona: Option<String>,
    },
    /// Base64 16-bit PCM, 16 kHz, mono.
    Audio { data: String },
    /// A base64 encoded still image, e.g. a screen-share frame.
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: Option<String>,
    },
    Text { text: String },
    /// The call is over.
    End,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    Input,
    Output,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status {
        message: String,
    },
    /// Agent speech, base64 encoded.
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Text {
        text: String,
    },
    Transcript {
        text: String,
        source: TranscriptSource,
        partial: bool,
    },
    ToolCall {
        name: String,
        args: Map<String, Value>,
    },
    /// `data` is the tool's return value: an object, or a string for anything else.
    ToolResult {
        name: String,
        data: Value,
    },
    TurnComplete,
    Usage {
        prompt_tokens: u32,
        candidates_tokens: u32,
        total_tokens: u32,
    },
    /// Reports a fatal error to the client.
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_frame_fields_are_optional() {
        let frame: ClientFrame = serde_json::from_value(json!({"type": "config"})).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Config {
                mode: None,
                voice: None,
                persona: None
            }
        );
    }

    #[test]
    fn test_image_frame_reads_camel_case_mime_type() {
        let frame: ClientFrame = serde_json::from_value(
            json!({"type": "image", "data": "AAAA", "mimeType": "image/png"}),
        )
        .unwrap();
        assert_eq!(
            frame,
            ClientFrame::Image {
                data: "AAAA".into(),
                mime_type: Some("image/png".into())
            }
        );
    }

    #[test]
    fn test_unknown_frame_type_is_an_error() {
        assert!(serde_json::from_value::<ClientFrame>(json!({"type": "dance"})).is_err());
        assert!(serde_json::from_value::<ClientFrame>(json!({"type": "text"})).is_err());
    }

    #[test]
    fn test_server_message_wire_shapes() {
        assert_eq!(
            serde_json::to_value(ServerMessage::TurnComplete).unwrap(),
            json!({"type": "turn_complete"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Transcript {
                text: "hi".into(),
                source: TranscriptSource::Input,
                partial: true,
            })
            .unwrap(),
            json!({"type": "transcript", "text": "hi", "source": "input", "partial": true})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Audio {
                data: "AAA=".into(),
                mime_type: "audio/pcm;rate=24000".into(),
            })
            .unwrap(),
            json!({"type": "audio", "data": "AAA=", "mimeType": "audio/pcm;rate=24000"})
        );
    }
}
