use crate::live::{AgentEvent, LiveError, LiveRequest, RunConfiguration};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio::sync::mpsc;

/// A stream of events from a live agent session.
///
/// The stream ends when the session is over; an `Err` item reports a failure
/// and is followed by the end of the stream.
pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, LiveError>> + Send>>;

/// Default number of requests buffered between the bridge and a runtime.
pub const REQUEST_QUEUE_CAPACITY: usize = 64;

/// Everything a runtime needs to know about the agent it should host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub name: String,
    pub instruction: String,
    /// Whether the session's toolbox is offered to the agent.
    pub coaching_tools: bool,
    /// Whether the runtime's built-in web search should be offered.
    pub google_search: bool,
}

/// The write side of a live session's request stream.
///
/// Dropping the queue (or calling [`LiveRequestQueue::close`]) closes the
/// request stream; the runtime then winds the session down.
#[derive(Debug)]
pub struct LiveRequestQueue {
    tx: mpsc::Sender<LiveRequest>,
}

#[derive(Debug, thiserror::Error)]
#[error("live request queue is closed")]
pub struct QueueClosed;

impl LiveRequestQueue {
    /// Creates a queue and the receiver a runtime drains it from.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LiveRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueues a request, waiting only for channel capacity.
    pub async fn send(&self, request: LiveRequest) -> Result<(), QueueClosed> {
        self.tx.send(request).await.map_err(|_| QueueClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn close(self) {}
}

/// A running live session: the request queue going in and the events coming out.
pub struct LiveConnection {
    pub requests: LiveRequestQueue,
    pub events: AgentEventStream,
}

/// A generic agent runtime capable of hosting live sessions.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Opens a new live session for `agent` with a fixed run configuration.
    async fn connect(
        &self,
        agent: AgentSpec,
        run_config: RunConfiguration,
    ) -> Result<LiveConnection, LiveError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::Content;

    #[tokio::test]
    async fn test_queue_preserves_order_and_closes_on_drop() {
        let (queue, mut rx) = LiveRequestQueue::channel(4);
        queue
            .send(LiveRequest::Content(Content::user_text("one")))
            .await
            .unwrap();
        queue
            .send(LiveRequest::Content(Content::user_text("two")))
            .await
            .unwrap();
        queue.close();

        assert_eq!(
            rx.recv().await,
            Some(LiveRequest::Content(Content::user_text("one")))
        );
        assert_eq!(
            rx.recv().await,
            Some(LiveRequest::Content(Content::user_text("two")))
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_send_fails_once_runtime_is_gone() {
        let (queue, rx) = LiveRequestQueue::channel(1);
        drop(rx);
        assert!(queue.is_closed());
        assert!(
            queue
                .send(LiveRequest::Content(Content::user_text("late")))
                .await
                .is_err()
        );
    }
}
