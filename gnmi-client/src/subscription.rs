//! Subscription event streaming

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tonic::Status;
use tracing::debug;

use crate::gnmi::SubscribeResponse;

/// Capacity of the channel between the receive task and the consumer.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// A single event observed on a running subscription.
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    /// A response pushed by the target (update, sync marker or legacy error).
    Update(SubscribeResponse),
    /// The target closed the stream. No further events follow.
    Ended,
    /// The stream failed. No further events follow.
    Errored(Status),
}

/// A running gNMI subscription.
///
/// Events are yielded in arrival order and the stream finishes with exactly
/// one terminal event, [`SubscriptionEvent::Ended`] or
/// [`SubscriptionEvent::Errored`], unless it is cancelled first. Dropping the
/// handle cancels the subscription.
pub struct SubscriptionStream {
    events: mpsc::Receiver<SubscriptionEvent>,
    task: JoinHandle<()>,
}

impl SubscriptionStream {
    /// Spawns the receive task. `connect` resolves to the gRPC response
    /// stream; a setup failure surfaces as the terminal `Errored` event
    /// rather than failing the spawn.
    pub(crate) fn spawn<F, S>(connect: F) -> Self
    where
        F: Future<Output = Result<S, Status>> + Send + 'static,
        S: Stream<Item = Result<SubscribeResponse, Status>> + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let task = tokio::spawn(async move {
            match connect.await {
                Ok(stream) => forward(stream, tx).await,
                Err(status) => {
                    let _ = tx.send(SubscriptionEvent::Errored(status)).await;
                }
            }
        });

        Self { events: rx, task }
    }

    /// Receives the next event. Returns `None` once the terminal event has
    /// been consumed or after the subscription was cancelled.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        self.events.recv().await
    }

    /// Cancels the subscription. Anything still buffered is discarded and
    /// the stream yields nothing from here on.
    pub fn cancel(&mut self) {
        self.task.abort();
        self.events.close();
        while self.events.try_recv().is_ok() {}
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Stream for SubscriptionStream {
    type Item = SubscriptionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

/// Pumps responses from the gRPC stream into the event channel until the
/// stream terminates, then sends the single terminal event.
async fn forward<S>(mut stream: S, tx: mpsc::Sender<SubscriptionEvent>)
where
    S: Stream<Item = Result<SubscribeResponse, Status>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(response)) => {
                if tx.send(SubscriptionEvent::Update(response)).await.is_err() {
                    // Consumer went away, stop pulling from the target.
                    return;
                }
            }
            Some(Err(status)) => {
                debug!("Subscription stream failed: {}", status);
                let _ = tx.send(SubscriptionEvent::Errored(status)).await;
                return;
            }
            None => {
                debug!("Subscription stream ended");
                let _ = tx.send(SubscriptionEvent::Ended).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gnmi::{Notification, subscribe_response::Response};

    type StubStream = tokio_stream::Iter<std::vec::IntoIter<Result<SubscribeResponse, Status>>>;

    fn update(timestamp: i64) -> SubscribeResponse {
        SubscribeResponse {
            response: Some(Response::Update(Notification {
                timestamp,
                ..Default::default()
            })),
            extension: vec![],
        }
    }

    fn timestamp_of(event: SubscriptionEvent) -> i64 {
        match event {
            SubscriptionEvent::Update(SubscribeResponse {
                response: Some(Response::Update(n)),
                ..
            }) => n.timestamp,
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_order_then_end() {
        let responses: Vec<Result<SubscribeResponse, Status>> =
            vec![Ok(update(1)), Ok(update(2)), Ok(update(3))];
        let mut stream = SubscriptionStream::spawn(async { Ok(tokio_stream::iter(responses)) });

        for expected in 1..=3 {
            let event = stream.next_event().await.expect("missing update");
            assert_eq!(timestamp_of(event), expected);
        }

        assert!(matches!(
            stream.next_event().await,
            Some(SubscriptionEvent::Ended)
        ));
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_mid_stream_error_is_terminal() {
        let responses: Vec<Result<SubscribeResponse, Status>> =
            vec![Ok(update(1)), Err(Status::unavailable("target gone"))];
        let mut stream = SubscriptionStream::spawn(async { Ok(tokio_stream::iter(responses)) });

        assert_eq!(timestamp_of(stream.next_event().await.unwrap()), 1);

        match stream.next_event().await {
            Some(SubscriptionEvent::Errored(status)) => {
                assert_eq!(status.code(), tonic::Code::Unavailable);
            }
            other => panic!("expected error event, got {:?}", other),
        }

        // The error is the one and only terminal event.
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_setup_failure_surfaces_as_error_event() {
        let mut stream = SubscriptionStream::spawn(async {
            Err::<StubStream, _>(Status::unauthenticated("bad credentials"))
        });

        match stream.next_event().await {
            Some(SubscriptionEvent::Errored(status)) => {
                assert_eq!(status.code(), tonic::Code::Unauthenticated);
            }
            other => panic!("expected error event, got {:?}", other),
        }
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_discards_buffered_events() {
        let responses: Vec<Result<SubscribeResponse, Status>> = vec![Ok(update(1)), Ok(update(2))];
        let mut stream = SubscriptionStream::spawn(async { Ok(tokio_stream::iter(responses)) });

        // Let the receive task buffer everything, then cancel before reading.
        (&mut stream.task).await.unwrap();
        stream.cancel();

        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_stops_pending_subscription() {
        let mut stream = SubscriptionStream::spawn(async { Ok(tokio_stream::pending()) });

        stream.cancel();
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_adapter_yields_terminal_event() {
        let responses: Vec<Result<SubscribeResponse, Status>> = vec![Ok(update(7))];
        let mut stream = SubscriptionStream::spawn(async { Ok(tokio_stream::iter(responses)) });

        let mut seen = Vec::new();
        while let Some(event) = stream.next().await {
            seen.push(event);
        }

        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], SubscriptionEvent::Update(_)));
        assert!(matches!(seen[1], SubscriptionEvent::Ended));
    }
}
