// Typed event channel
//
// Vendor SDKs report progress through callbacks (intermediate-message hooks,
// filter pipelines). Adapters push what they see into an EventSender; the chat
// session consumes the matching EventReceiver as an ordinary stream. This keeps
// the reconciler independent of any SDK callback signature.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{ChatError, Result};
use crate::events::StreamEvent;
use crate::traits::EventStream;

/// Default buffer size between an SDK adapter and the session
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Create a bounded event channel
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        EventSender { tx },
        EventReceiver {
            inner: ReceiverStream::new(rx),
        },
    )
}

/// Producer half, cloned into SDK callbacks
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Result<StreamEvent>>,
}

impl EventSender {
    /// Send an event, waiting for buffer space
    pub async fn send(&self, event: StreamEvent) -> Result<()> {
        self.tx
            .send(Ok(event))
            .await
            .map_err(|_| ChatError::invocation("event receiver dropped"))
    }

    /// Send from synchronous callback code; fails when the buffer is full
    pub fn try_send(&self, event: StreamEvent) -> Result<()> {
        self.tx.try_send(Ok(event)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChatError::invocation("event channel full"),
            mpsc::error::TrySendError::Closed(_) => {
                ChatError::invocation("event receiver dropped")
            }
        })
    }

    /// Report that the invocation failed mid-stream
    pub async fn fail(&self, error: ChatError) -> Result<()> {
        self.tx
            .send(Err(error))
            .await
            .map_err(|_| ChatError::invocation("event receiver dropped"))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half; ends once every sender is dropped
#[derive(Debug)]
pub struct EventReceiver {
    inner: ReceiverStream<Result<StreamEvent>>,
}

impl EventReceiver {
    pub fn into_stream(self) -> EventStream {
        Box::pin(self)
    }
}

impl Stream for EventReceiver {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
