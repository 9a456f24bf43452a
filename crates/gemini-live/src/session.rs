//! The per-connection task that pumps requests up to Gemini and events back.

use crate::assembler::EventAssembler;
use crate::types::{
    ClientContent, ClientMessage, FunctionCall, FunctionResponse, RealtimeInput, ServerMessage,
    ToolResponse, WireBlob, WireContent,
};
use coach_core::live::{
    AgentEvent, Blob, Content, EventPart, LiveError, LiveRequest, Part, ToolInvocation, ToolResult,
};
use coach_core::tools::Toolbox;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::{Map, Value, json};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message as WsMessage};
use tracing::{debug, error, info, warn};

pub(crate) type EventSender = mpsc::Sender<Result<AgentEvent, LiveError>>;

enum Flow {
    Continue,
    Stop,
}

fn decode_frame(frame: &WsMessage) -> Option<Result<ServerMessage, serde_json::Error>> {
    match frame {
        WsMessage::Text(text) => Some(serde_json::from_str(text)),
        WsMessage::Binary(bytes) => Some(serde_json::from_slice(bytes)),
        _ => None,
    }
}

fn close_reason(frame: &Option<CloseFrame>) -> String {
    match frame {
        Some(frame) => format!("{} {}", frame.code, frame.reason),
        None => "no close frame".to_string(),
    }
}

/// A turn holding nothing but an image is streamed as a video frame.
fn lone_image(content: &Content) -> Option<&Blob> {
    match content.parts.as_slice() {
        [Part::InlineData(blob)] if blob.mime_type.starts_with("image/") => Some(blob),
        _ => None,
    }
}

fn realtime(blob: &Blob) -> ClientMessage {
    let wire = WireBlob::encode(blob);
    ClientMessage::RealtimeInput(if blob.mime_type.starts_with("audio/") {
        RealtimeInput {
            audio: Some(wire),
            ..Default::default()
        }
    } else {
        RealtimeInput {
            video: Some(wire),
            ..Default::default()
        }
    })
}

/// Reads until the server acknowledges the setup message.
pub(crate) async fn await_setup_complete<R, E>(stream: &mut R) -> Result<(), LiveError>
where
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|e| LiveError::Connect(e.to_string()))?;
        if let WsMessage::Close(close) = &frame {
            return Err(LiveError::Connect(format!(
                "closed during setup: {}",
                close_reason(close)
            )));
        }
        match decode_frame(&frame) {
            Some(Ok(message)) if message.setup_complete.is_some() => return Ok(()),
            Some(Ok(message)) => debug!(?message, "Ignoring message received before setupComplete"),
            Some(Err(e)) => warn!(error = %e, "Failed to parse Gemini message during setup"),
            None => {}
        }
    }
    Err(LiveError::Connect("connection ended during setup".into()))
}

pub(crate) struct LiveSession<S, R> {
    sink: S,
    stream: R,
    requests: mpsc::Receiver<LiveRequest>,
    events: EventSender,
    toolbox: Option<Arc<dyn Toolbox>>,
    assembler: EventAssembler,
}

impl<S, R, E> LiveSession<S, R>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    pub fn new(
        sink: S,
        stream: R,
        requests: mpsc::Receiver<LiveRequest>,
        events: EventSender,
        toolbox: Option<Arc<dyn Toolbox>>,
    ) -> Self {
        Self {
            sink,
            stream,
            requests,
            events,
            toolbox,
            assembler: EventAssembler::default(),
        }
    }

    /// Runs until the request queue closes, the upstream fails, or the
    /// event stream is dropped.
    pub async fn run(mut self) {
        loop {
            let flow = tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.forward(request).await,
                    None => {
                        info!("Request stream closed, closing Gemini session");
                        if let Err(e) = self.sink.close().await {
                            debug!(error = %e, "Error closing Gemini socket");
                        }
                        Flow::Stop
                    }
                },
                frame = self.stream.next() => self.receive(frame).await,
                _ = self.events.closed() => {
                    debug!("Event stream dropped, stopping Gemini session");
                    Flow::Stop
                }
            };
            if let Flow::Stop = flow {
                break;
            }
        }
    }

    async fn forward(&mut self, request: LiveRequest) -> Flow {
        let message = match request {
            LiveRequest::Content(content) => match lone_image(&content) {
                Some(blob) => realtime(blob),
                None => ClientMessage::ClientContent(ClientContent {
                    turns: vec![WireContent::from_content(&content)],
                    turn_complete: true,
                }),
            },
            LiveRequest::Realtime(blob) => realtime(&blob),
        };
        self.send(&message).await
    }

    async fn send(&mut self, message: &ClientMessage) -> Flow {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to serialize message for Gemini");
                return Flow::Continue;
            }
        };
        match self.sink.send(WsMessage::Text(payload.into())).await {
            Ok(()) => Flow::Continue,
            Err(e) => self.fail(LiveError::Transport(e.to_string())).await,
        }
    }

    async fn emit(&mut self, event: AgentEvent) -> Flow {
        match self.events.send(Ok(event)).await {
            Ok(()) => Flow::Continue,
            Err(_) => {
                debug!("Event stream dropped while emitting");
                Flow::Stop
            }
        }
    }

    async fn fail(&mut self, error: LiveError) -> Flow {
        error!(%error, "Gemini session failed");
        let _ = self.events.send(Err(error)).await;
        Flow::Stop
    }

    async fn receive(&mut self, frame: Option<Result<WsMessage, E>>) -> Flow {
        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return self.fail(LiveError::Transport(e.to_string())).await,
            None => return self.fail(LiveError::Closed("connection ended".into())).await,
        };
        if let WsMessage::Close(close) = &frame {
            return self.fail(LiveError::Closed(close_reason(close))).await;
        }
        let message = match decode_frame(&frame) {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!(error = %e, "Skipping undecodable Gemini message");
                return Flow::Continue;
            }
            None => return Flow::Continue,
        };

        if let Some(event) = self.assembler.assemble(&message) {
            if let Flow::Stop = self.emit(event).await {
                return Flow::Stop;
            }
        }
        match message.tool_call {
            Some(call) if !call.function_calls.is_empty() => {
                self.run_tool_calls(call.function_calls).await
            }
            _ => Flow::Continue,
        }
    }

    /// Surfaces the calls, executes them, surfaces the results and answers Gemini.
    async fn run_tool_calls(&mut self, calls: Vec<FunctionCall>) -> Flow {
        let invocations: Vec<ToolInvocation> = calls
            .into_iter()
            .map(|call| ToolInvocation {
                id: call.id,
                name: call.name,
                args: call.args,
            })
            .collect();
        let event = AgentEvent::single(EventPart::ToolCalls(invocations.clone()));
        if let Flow::Stop = self.emit(event).await {
            return Flow::Stop;
        }

        let mut results = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            info!(tool = %invocation.name, "Executing tool call");
            let args = match invocation.args {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            let response = match &self.toolbox {
                Some(toolbox) => toolbox.invoke(&invocation.name, args).await,
                None => json!({
                    "status": "error",
                    "message": format!("Tool '{}' is not available", invocation.name),
                }),
            };
            results.push(ToolResult {
                id: invocation.id,
                name: invocation.name,
                response,
            });
        }

        let function_responses = results
            .iter()
            .map(|result| FunctionResponse {
                id: result.id.clone(),
                name: result.name.clone(),
                response: match &result.response {
                    Value::Object(_) => result.response.clone(),
                    other => json!({ "result": other }),
                },
            })
            .collect();
        if let Flow::Stop = self
            .emit(AgentEvent::single(EventPart::ToolResults(results)))
            .await
        {
            return Flow::Stop;
        }
        self.send(&ClientMessage::ToolResponse(ToolResponse { function_responses }))
            .await
    }
}
