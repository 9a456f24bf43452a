//! Gemini Live agent runtime.
//!
//! Hosts a [`coach_core::runtime::AgentRuntime`] session on the Gemini Live
//! `BidiGenerateContent` WebSocket. Tool calls are executed here, against the
//! session's toolbox, and both the call and its result are surfaced in the
//! event stream so downstream consumers see them as ordinary events.

mod assembler;
mod session;
pub mod types;

use async_trait::async_trait;
use coach_core::live::{LiveError, Modality, RunConfiguration};
use coach_core::runtime::{
    AgentRuntime, AgentSpec, LiveConnection, LiveRequestQueue, REQUEST_QUEUE_CAPACITY,
};
use coach_core::tools::{ToolDeclaration, ToolboxProvider};
use futures_util::{SinkExt, StreamExt};
use session::LiveSession;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};
use tracing::{Instrument, info, instrument};
use types::{
    AudioTranscriptionConfig, ClientMessage, FunctionDeclaration, GenerationConfig, GoogleSearch,
    PrebuiltVoiceConfig, Setup, SpeechConfig, Tool, VoiceConfig, WireContent,
};

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Upper bound for the server to acknowledge `setup`.
const SETUP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GeminiLiveRuntime {
    api_key: String,
    model: String,
    endpoint: String,
    tools: Arc<dyn ToolboxProvider>,
}

impl GeminiLiveRuntime {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        tools: Arc<dyn ToolboxProvider>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            tools,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/// Builds the `setup` message for one session.
///
/// Speech settings are only sent for audio sessions.
pub(crate) fn setup_message(
    model: &str,
    agent: &AgentSpec,
    run_config: &RunConfiguration,
    declarations: Vec<ToolDeclaration>,
) -> Setup {
    let speech_config = (run_config.response_modality == Modality::Audio).then(|| SpeechConfig {
        voice_config: VoiceConfig {
            prebuilt_voice_config: PrebuiltVoiceConfig {
                voice_name: run_config.voice.clone(),
            },
        },
        language_code: run_config.language_code.clone(),
    });

    let mut tools = Vec::new();
    if !declarations.is_empty() {
        tools.push(Tool {
            function_declarations: declarations
                .into_iter()
                .map(|d| FunctionDeclaration {
                    name: d.name,
                    description: d.description,
                    parameters_json_schema: d.parameters,
                })
                .collect(),
            ..Default::default()
        });
    }
    if agent.google_search {
        tools.push(Tool {
            google_search: Some(GoogleSearch::default()),
            ..Default::default()
        });
    }

    Setup {
        model: model_path(model),
        generation_config: GenerationConfig {
            response_modalities: vec![run_config.response_modality],
            speech_config,
        },
        system_instruction: WireContent::instruction(&agent.instruction),
        tools,
        input_audio_transcription: run_config
            .input_transcription
            .then(AudioTranscriptionConfig::default),
        output_audio_transcription: run_config
            .output_transcription
            .then(AudioTranscriptionConfig::default),
    }
}

#[async_trait]
impl AgentRuntime for GeminiLiveRuntime {
    #[instrument(name = "gemini_connect", skip_all, fields(agent = %agent.name))]
    async fn connect(
        &self,
        agent: AgentSpec,
        run_config: RunConfiguration,
    ) -> Result<LiveConnection, LiveError> {
        let (toolbox, declarations) = if agent.coaching_tools {
            let toolbox = self
                .tools
                .open()
                .await
                .map_err(|e| LiveError::Connect(e.to_string()))?;
            let declarations = toolbox
                .declarations()
                .await
                .map_err(|e| LiveError::Connect(e.to_string()))?;
            (Some(toolbox), declarations)
        } else {
            (None, Vec::new())
        };
        let setup = setup_message(&self.model, &agent, &run_config, declarations);
        let payload = serde_json::to_string(&ClientMessage::Setup(setup))
            .map_err(|e| LiveError::Protocol(e.to_string()))?;

        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| LiveError::Connect(e.to_string()))?;
        info!(model = %self.model, "Connected to Gemini Live WebSocket");
        let (mut sink, mut stream) = socket.split();

        sink.send(WsMessage::Text(payload.into()))
            .await
            .map_err(|e| LiveError::Connect(e.to_string()))?;
        tokio::time::timeout(SETUP_TIMEOUT, session::await_setup_complete(&mut stream))
            .await
            .map_err(|_| LiveError::Connect("timed out waiting for setupComplete".into()))??;
        info!("Gemini session setup is complete");

        let (requests, request_rx) = LiveRequestQueue::channel(REQUEST_QUEUE_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
        let session = LiveSession::new(sink, stream, request_rx, events_tx, toolbox);
        tokio::spawn(session.run().in_current_span());

        Ok(LiveConnection {
            requests,
            events: Box::pin(ReceiverStream::new(events_rx)),
        })
    }
}
