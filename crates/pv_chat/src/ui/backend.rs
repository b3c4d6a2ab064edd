use crate::conversation::{Conversation, PendingRequest};
use llm::{ApiError, BoxedChunkStream, ChatClient, EventReader, StreamEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What a request task reports back to the UI loop
#[derive(Debug, Clone, PartialEq)]
pub enum RequestUpdate {
    /// A decoded event from the stream
    Event(StreamEvent),
    /// The request could not be sent, or the stream broke or stalled
    TransportError(String),
    /// The transport ended without a completion event
    Closed,
    /// The task observed cancellation and stopped
    Cancelled,
}

pub type UpdateSender = mpsc::UnboundedSender<(u64, RequestUpdate)>;
pub type UpdateReceiver = mpsc::UnboundedReceiver<(u64, RequestUpdate)>;

pub fn update_channel() -> (UpdateSender, UpdateReceiver) {
    mpsc::unbounded_channel()
}

/// Route an update to the matching transition of the state machine
pub fn apply_update(conversation: &mut Conversation, id: u64, update: RequestUpdate) -> bool {
    match update {
        RequestUpdate::Event(event) => conversation.apply(id, event),
        RequestUpdate::TransportError(reason) => conversation.transport_failed(id, &reason),
        RequestUpdate::Closed => conversation.stream_closed(id),
        RequestUpdate::Cancelled => {
            debug!("Request {} acknowledged cancellation", id);
            false
        }
    }
}

/// Run `request` on the tokio runtime, reporting into `updates`
pub fn spawn_request(
    client: ChatClient,
    request: PendingRequest,
    stall_timeout: Option<Duration>,
    updates: UpdateSender,
) -> JoinHandle<()> {
    tokio::spawn(run_request(client, request, stall_timeout, updates))
}

/// Drive one request until it completes, fails, or is cancelled.
///
/// Never touches the conversation; everything goes through `updates` tagged
/// with the request id.
pub async fn run_request(
    client: ChatClient,
    request: PendingRequest,
    stall_timeout: Option<Duration>,
    updates: UpdateSender,
) {
    let PendingRequest {
        id,
        question,
        cancel,
    } = request;

    let send = |update: RequestUpdate| {
        if updates.send((id, update)).is_err() {
            debug!("Update receiver for request {} is gone", id);
        }
    };

    let mut reader = tokio::select! {
        _ = cancel.cancelled() => {
            send(RequestUpdate::Cancelled);
            return;
        }
        result = client.stream(&question) => match result {
            Ok(reader) => reader,
            Err(e) => {
                warn!("Request {} could not be started: {:#}", id, e);
                send(RequestUpdate::TransportError(format!("{e:#}")));
                return;
            }
        }
    };
    info!("Request {} is streaming", id);

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                send(RequestUpdate::Cancelled);
                return;
            }
            next = next_event(&mut reader, stall_timeout) => next,
        };

        match next {
            Ok(Some(event)) => {
                let terminal = !matches!(event, StreamEvent::Chunk(_));
                send(RequestUpdate::Event(event));
                if terminal {
                    return;
                }
            }
            Ok(None) => {
                send(RequestUpdate::Closed);
                return;
            }
            Err(e) => {
                warn!("Request {} stream failed: {:#}", id, e);
                send(RequestUpdate::TransportError(format!("{e:#}")));
                return;
            }
        }
    }
}

async fn next_event(
    reader: &mut EventReader<BoxedChunkStream>,
    stall_timeout: Option<Duration>,
) -> anyhow::Result<Option<StreamEvent>> {
    match stall_timeout {
        Some(limit) => match tokio::time::timeout(limit, reader.next_event()).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Stalled(limit.as_secs()).into()),
        },
        None => reader.next_event().await,
    }
}
