//! Wire types for the Gemini Live `BidiGenerateContent` protocol.
//!
//! Only the fields this runtime reads or writes are modelled; unknown server
//! fields are ignored by serde.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use coach_core::live::{Blob, Content, Modality, Part, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Client -> Server ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    ClientContent(ClientContent),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: WireContent,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<AudioTranscriptionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<AudioTranscriptionConfig>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// Enables transcription; the server expects an empty object.
#[derive(Serialize, Debug, Default)]
pub struct AudioTranscriptionConfig {}

#[derive(Serialize, Debug, Default)]
pub struct GoogleSearch {}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub function_declarations: Vec<FunctionDeclaration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<GoogleSearch>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters_json_schema: Value,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<WireContent>,
    pub turn_complete: bool,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<WireBlob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<WireBlob>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Serialize, Debug)]
pub struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

// --- Shared ---

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<WireBlob>,
    /// Set on the model's internal reasoning parts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

/// Binary payload, base64 encoded on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireBlob {
    pub mime_type: String,
    pub data: String,
}

impl WireBlob {
    pub fn encode(blob: &Blob) -> Self {
        Self {
            mime_type: blob.mime_type.clone(),
            data: BASE64.encode(&blob.data),
        }
    }

    pub fn decode(&self) -> Result<Blob, base64::DecodeError> {
        Ok(Blob {
            mime_type: self.mime_type.clone(),
            data: BASE64.decode(&self.data)?.into(),
        })
    }
}

impl WireContent {
    pub fn instruction(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![WirePart {
                text: Some(text.to_string()),
                ..Default::default()
            }],
        }
    }

    pub fn from_content(content: &Content) -> Self {
        let parts = content
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => WirePart {
                    text: Some(text.clone()),
                    ..Default::default()
                },
                Part::InlineData(blob) => WirePart {
                    inline_data: Some(WireBlob::encode(blob)),
                    ..Default::default()
                },
            })
            .collect();
        Self {
            role: Some(content.role.as_str().to_string()),
            parts,
        }
    }

    pub fn role(&self) -> Role {
        match self.role.as_deref() {
            Some("user") => Role::User,
            _ => Role::Model,
        }
    }
}

// --- Server -> Client ---

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<Value>,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ToolCall>,
    pub tool_call_cancellation: Option<ToolCallCancellation>,
    pub usage_metadata: Option<WireUsage>,
    pub go_away: Option<GoAway>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    pub model_turn: Option<WireContent>,
    pub turn_complete: Option<bool>,
    pub interrupted: Option<bool>,
    pub generation_complete: Option<bool>,
    pub input_transcription: Option<WireTranscription>,
    pub output_transcription: Option<WireTranscription>,
}

#[derive(Deserialize, Debug, Default)]
pub struct WireTranscription {
    pub text: Option<String>,
    pub finished: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Deserialize, Debug)]
pub struct FunctionCall {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Deserialize, Debug, Default)]
pub struct ToolCallCancellation {
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct WireUsage {
    pub prompt_token_count: Option<u32>,
    #[serde(alias = "candidatesTokenCount")]
    pub response_token_count: Option<u32>,
    pub total_token_count: Option<u32>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    pub time_left: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_realtime_audio_serializes_base64_blob() {
        let msg = ClientMessage::RealtimeInput(RealtimeInput {
            audio: Some(WireBlob::encode(&Blob {
                mime_type: "audio/pcm;rate=16000".into(),
                data: vec![1u8, 2, 3].into(),
            })),
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"realtimeInput": {"audio": {"mimeType": "audio/pcm;rate=16000", "data": "AQID"}}})
        );
    }

    #[test]
    fn test_client_content_carries_role_and_turn_complete() {
        let msg = ClientMessage::ClientContent(ClientContent {
            turns: vec![WireContent::from_content(&Content::user_text("hello"))],
            turn_complete: true,
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"clientContent": {"turns": [{"role": "user", "parts": [{"text": "hello"}]}], "turnComplete": true}})
        );
    }

    #[test]
    fn test_server_message_parses_content_and_usage() {
        let raw = json!({
            "serverContent": {
                "modelTurn": {"parts": [{"text": "Ask about budget"}, {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAA="}}]},
                "turnComplete": true
            },
            "usageMetadata": {"promptTokenCount": 10, "responseTokenCount": 5, "totalTokenCount": 15},
            "somethingNew": {"ignored": true}
        });
        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        let content = msg.server_content.unwrap();
        assert_eq!(content.model_turn.unwrap().parts.len(), 2);
        assert_eq!(content.turn_complete, Some(true));
        let usage = msg.usage_metadata.unwrap();
        assert_eq!(usage.response_token_count, Some(5));
        assert_eq!(usage.total_token_count, Some(15));
    }

    #[test]
    fn test_candidates_token_count_alias() {
        let usage: WireUsage = serde_json::from_value(json!({"candidatesTokenCount": 7})).unwrap();
        assert_eq!(usage.response_token_count, Some(7));
        assert_eq!(usage.prompt_token_count, None);
    }

    #[test]
    fn test_tool_call_args_default_to_null() {
        let msg: ServerMessage =
            serde_json::from_value(json!({"toolCall": {"functionCalls": [{"id": "c1", "name": "update_dashboard"}]}}))
                .unwrap();
        let calls = msg.tool_call.unwrap().function_calls;
        assert_eq!(calls[0].name, "update_dashboard");
        assert!(calls[0].args.is_null());
    }
}
