//! Duplex Bridge
//!
//! Relays one client connection to one live agent session. After the config
//! handshake two loops run side by side until either finishes:
//!
//! - forward: agent events -> [`translate`] -> client messages
//! - read: client frames -> agent request queue
//!
//! The loops share nothing but the request queue (written only by the read
//! loop), a cancellation token, and a flag raised once the closing summary
//! has reached the client. Whichever loop exits first cancels the other.

use super::mode::{ClosingRequest, SessionConfig};
use super::protocol::{ClientFrame, ServerMessage};
use super::translate::translate;
use crate::registry::{SessionGuard, SessionState};
use crate::state::AppState;
use anyhow::{Result, anyhow};
use axum::extract::ws::Message;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use coach_core::live::{Blob, Content, LiveRequest};
use coach_core::runtime::{AgentEventStream, LiveConnection, LiveRequestQueue};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, error, info, warn};

/// Sample format of client microphone audio.
pub const AUDIO_INPUT_MIME: &str = "audio/pcm;rate=16000";
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Sends a message to the client over the WebSocket.
pub async fn send_msg<S>(sink: &mut S, msg: ServerMessage) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let serialized = serde_json::to_string(&msg)?;
    sink.send(Message::Text(serialized.into()))
        .await
        .map_err(|e| anyhow!("Failed to send message to client: {e}"))
}

enum FirstFrame {
    Config(SessionConfig),
    /// A valid frame that is not `config`; it still has to be processed.
    Other(ClientFrame),
    Missing,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForwardEnd {
    Finished,
    Failed,
    ClientGone,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    Ended,
    Disconnected,
    UpstreamClosed,
    Cancelled,
}

enum Enqueue {
    Sent,
    Closed,
    Cancelled,
}

/// The post-`end` wait for the agent's closing summary.
struct SummaryWait {
    request: ClosingRequest,
    grace: Duration,
    delivered: watch::Receiver<bool>,
}

/// Runs the bridge for one connection until the session is over.
///
/// Never returns an error: every failure ends in teardown, with a best-effort
/// `error` message to the client where one makes sense.
pub async fn run_bridge<S, R, E>(state: Arc<AppState>, mut sink: S, mut stream: R, user: String)
where
    S: Sink<Message> + Unpin + Send,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display + Send,
{
    let guard = match state.registry.create(&user) {
        Ok(guard) => guard,
        Err(e) => {
            warn!(error = %e, "Rejecting connection");
            let _ = send_msg(&mut sink, ServerMessage::Error { message: e.to_string() }).await;
            let _ = sink.close().await;
            return;
        }
    };
    let span = Span::current();
    span.record("session_id", tracing::field::display(guard.id()));
    info!("New WebSocket connection. Awaiting config...");

    let (config, replay) = match await_config(&mut stream, state.config.config_timeout).await {
        FirstFrame::Config(config) => (Some(config), None),
        FirstFrame::Other(frame) => {
            info!("First frame was not a config frame, using defaults");
            (None, Some(frame))
        }
        FirstFrame::Missing => (None, None),
        FirstFrame::Disconnected => {
            info!("Client disconnected before the session started");
            guard.teardown();
            return;
        }
    };

    let plan = state.resolver.resolve(config.as_ref());
    span.record("mode", plan.mode.as_str());
    if let Some(persona) = &plan.persona_id {
        span.record("persona", persona.as_str());
    }
    guard.set_plan(plan.clone());

    let agent = state.agents.build(&plan.variant);
    let mut pending: VecDeque<ClientFrame> = replay.into_iter().collect();
    let connected = tokio::select! {
        connected = state.runtime.connect(agent, plan.run_config.clone()) => connected,
        _ = buffer_until_disconnected(&mut stream, &mut pending) => {
            info!("Client disconnected while the agent session was starting");
            guard.teardown();
            return;
        }
    };
    let LiveConnection { requests, events } = match connected {
        Ok(connection) => connection,
        Err(e) => {
            error!(error = %e, "Failed to start agent session");
            let _ = send_msg(&mut sink, ServerMessage::Error { message: e.to_string() }).await;
            close(guard, sink).await;
            return;
        }
    };

    let status = ServerMessage::Status {
        message: plan.status_message(),
    };
    if let Err(e) = send_msg(&mut sink, status).await {
        warn!(error = %e, "Client went away before the session started");
        close(guard, sink).await;
        return;
    }
    guard.advance(SessionState::Active);

    let cancel = CancellationToken::new();
    let (delivered_tx, delivered_rx) = watch::channel(false);
    let closing_tool = plan.closing.as_ref().map(|closing| closing.tool);
    let summary = plan.closing.clone().map(|request| SummaryWait {
        request,
        grace: state.config.summary_grace,
        delivered: delivered_rx,
    });

    let forward = async {
        let end = forward_events(&mut sink, events, &cancel, closing_tool, &delivered_tx).await;
        cancel.cancel();
        end
    };
    let read = async {
        let mut end = read_frames(&mut stream, requests, pending, &guard, &cancel, summary).await;
        if end == ReadEnd::Ended {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = until_disconnected(&mut stream) => {
                    info!("Client disconnected while the agent stream drained");
                    end = ReadEnd::Disconnected;
                }
                _ = tokio::time::sleep(state.config.drain_timeout) => {
                    warn!("Agent stream did not finish draining in time, cancelling");
                }
            }
        }
        cancel.cancel();
        end
    };
    let (forward_end, read_end) = tokio::join!(forward, read);
    info!(?forward_end, ?read_end, "Session ended");

    close(guard, sink).await;
}

/// Tears the session down, then closes the client socket best-effort.
async fn close<S>(guard: SessionGuard, mut sink: S)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    guard.teardown();
    if let Err(e) = sink.close().await {
        debug!(error = %e, "Error while closing client socket");
    }
}

/// Waits for the first client frame, up to `wait`.
async fn await_config<R, E>(stream: &mut R, wait: Duration) -> FirstFrame
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let deadline = Instant::now() + wait;
    loop {
        let next = match timeout_at(deadline, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                info!(timeout_secs = wait.as_secs(), "No config received in time, using defaults");
                return FirstFrame::Missing;
            }
        };
        match next {
            Some(Ok(Message::Text(text))) => {
                return match serde_json::from_str::<ClientFrame>(text.as_str()) {
                    Ok(ClientFrame::Config {
                        mode,
                        voice,
                        persona,
                    }) => FirstFrame::Config(SessionConfig {
                        mode,
                        voice,
                        persona,
                    }),
                    Ok(frame) => FirstFrame::Other(frame),
                    Err(e) => {
                        warn!(error = %e, "Malformed config frame, using defaults");
                        FirstFrame::Missing
                    }
                };
            }
            Some(Ok(Message::Binary(_))) => {
                warn!("Binary first frame, using defaults");
                return FirstFrame::Missing;
            }
            Some(Ok(Message::Close(_))) | None => return FirstFrame::Disconnected,
            Some(Err(e)) => {
                debug!(error = %e, "Client connection failed during config");
                return FirstFrame::Disconnected;
            }
            Some(Ok(_)) => continue,
        }
    }
}

/// Sends unless the session is cancelled first. Returns whether it was sent.
async fn send_cancellable<S>(sink: &mut S, msg: ServerMessage, cancel: &CancellationToken) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = send_msg(sink, msg) => match sent {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Client send failed");
                false
            }
        },
    }
}

async fn forward_events<S>(
    sink: &mut S,
    mut events: AgentEventStream,
    cancel: &CancellationToken,
    closing_tool: Option<&str>,
    delivered: &watch::Sender<bool>,
) -> ForwardEnd
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return ForwardEnd::Cancelled,
            next = events.next() => next,
        };
        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                error!(error = %e, "Agent stream failed");
                send_cancellable(sink, ServerMessage::Error { message: e.to_string() }, cancel)
                    .await;
                return ForwardEnd::Failed;
            }
            None => {
                info!("Agent event stream finished");
                return ForwardEnd::Finished;
            }
        };

        let carries_summary = closing_tool.is_some_and(|tool| event.has_tool_result(tool));
        for message in translate(event) {
            if !send_cancellable(sink, message, cancel).await {
                return if cancel.is_cancelled() {
                    ForwardEnd::Cancelled
                } else {
                    ForwardEnd::ClientGone
                };
            }
        }
        if carries_summary {
            debug!("Closing summary delivered to client");
            delivered.send_replace(true);
        }
    }
}

async fn enqueue(
    queue: &LiveRequestQueue,
    request: LiveRequest,
    cancel: &CancellationToken,
) -> Enqueue {
    tokio::select! {
        _ = cancel.cancelled() => Enqueue::Cancelled,
        sent = queue.send(request) => match sent {
            Ok(()) => Enqueue::Sent,
            Err(_) => Enqueue::Closed,
        },
    }
}

fn decode_payload(data: &str) -> Result<bytes::Bytes, base64::DecodeError> {
    BASE64.decode(data).map(Into::into)
}

async fn read_frames<R, E>(
    stream: &mut R,
    queue: LiveRequestQueue,
    mut pending: VecDeque<ClientFrame>,
    guard: &SessionGuard,
    cancel: &CancellationToken,
    summary: Option<SummaryWait>,
) -> ReadEnd
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let frame = match pending.pop_front() {
            Some(frame) => frame,
            None => {
                let next = tokio::select! {
                    _ = cancel.cancelled() => return ReadEnd::Cancelled,
                    next = stream.next() => next,
                };
                match next {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(text.as_str()) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!(error = %e, "Skipping malformed client frame");
                                continue;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client disconnected");
                        return ReadEnd::Disconnected;
                    }
                    Some(Err(e)) => {
                        info!(error = %e, "Client connection failed");
                        return ReadEnd::Disconnected;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Ignoring binary client frame");
                        continue;
                    }
                    Some(Ok(_)) => continue,
                }
            }
        };

        let request = match frame {
            ClientFrame::End => break,
            ClientFrame::Config { .. } => {
                debug!("Ignoring config frame after session start");
                continue;
            }
            ClientFrame::Text { text } => LiveRequest::Content(Content::user_text(text)),
            ClientFrame::Audio { data } => match decode_payload(&data) {
                Ok(data) => LiveRequest::Realtime(Blob {
                    mime_type: AUDIO_INPUT_MIME.to_string(),
                    data,
                }),
                Err(e) => {
                    warn!(error = %e, "Skipping audio frame with invalid base64");
                    continue;
                }
            },
            ClientFrame::Image { data, mime_type } => match decode_payload(&data) {
                Ok(data) => LiveRequest::Content(Content::user_blob(Blob {
                    mime_type: mime_type
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
                    data,
                })),
                Err(e) => {
                    warn!(error = %e, "Skipping image frame with invalid base64");
                    continue;
                }
            },
        };
        match enqueue(&queue, request, cancel).await {
            Enqueue::Sent => {}
            Enqueue::Cancelled => return ReadEnd::Cancelled,
            Enqueue::Closed => {
                warn!("Agent request stream closed");
                return ReadEnd::UpstreamClosed;
            }
        }
    }

    info!("Client ended the call");
    guard.advance(SessionState::Draining);
    if let Some(summary) = summary {
        if let Some(end) = request_summary(stream, &queue, summary, cancel).await {
            return end;
        }
    }
    queue.close();
    ReadEnd::Ended
}

/// Asks the agent for its closing summary, then waits for the first of: the
/// summary reaching the client, the grace period, or the session going away.
async fn request_summary<R, E>(
    stream: &mut R,
    queue: &LiveRequestQueue,
    summary: SummaryWait,
    cancel: &CancellationToken,
) -> Option<ReadEnd>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let SummaryWait {
        request,
        grace,
        mut delivered,
    } = summary;
    let instruction = LiveRequest::Content(Content::user_text(request.instruction));
    match enqueue(queue, instruction, cancel).await {
        Enqueue::Sent => info!(tool = request.tool, "Requested closing summary"),
        Enqueue::Cancelled => return Some(ReadEnd::Cancelled),
        Enqueue::Closed => return Some(ReadEnd::UpstreamClosed),
    }

    let acknowledged = async {
        if delivered.wait_for(|done| *done).await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = tokio::time::sleep(grace) => {
            info!(grace_secs = grace.as_secs(), "Summary grace period elapsed");
            None
        }
        _ = acknowledged => {
            info!("Closing summary reached the client");
            None
        }
        _ = cancel.cancelled() => Some(ReadEnd::Cancelled),
        _ = until_disconnected(stream) => {
            info!("Client disconnected during summary grace period");
            Some(ReadEnd::Disconnected)
        }
    }
}

/// Holds on to client frames until the client goes away. Frames that arrive
/// before the agent session exists are kept in `pending` for later.
async fn buffer_until_disconnected<R, E>(stream: &mut R, pending: &mut VecDeque<ClientFrame>)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(frame) => pending.push_back(frame),
                Err(e) => warn!(error = %e, "Skipping malformed client frame"),
            },
            Message::Close(_) => return,
            _ => {}
        }
    }
}

/// Drains frames sent after `end` until the client goes away.
async fn until_disconnected<R, E>(stream: &mut R)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    while let Some(Ok(message)) = stream.next().await {
        if let Message::Close(_) = message {
            return;
        }
        debug!("Ignoring client frame received after end");
    }
}
