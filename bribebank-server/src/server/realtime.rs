//! In-process fan-out of [`ServerEvent`]s to Server-Sent Event streams.
//!
//! One broadcast channel serves every family; each stream forwards only the
//! events of its subscriber's family. Broadcasts never leave this process.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use bribebank_shared::api::ServerEvent;
use chrono::Utc;
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Returns how many streams were listening. Nobody listening is fine.
    pub fn publish(&self, event: ServerEvent) -> usize {
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(n) => {
                trace!(kind, receivers = n, "realtime: published");
                n
            }
            Err(_) => 0,
        }
    }
}

fn to_frame(event: &ServerEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(data) => Some(Event::default().data(data)),
        Err(e) => {
            warn!(kind = event.kind(), error = %e, "realtime: failed to encode event");
            None
        }
    }
}

/// Streams `CONNECTED` and then every event of `family_id` until the client
/// goes away or `shutdown` fires.
pub fn family_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    family_id: String,
    keepalive: Duration,
    shutdown: CancellationToken,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let hello = ServerEvent::Connected {
            message: "realtime stream connected".to_string(),
            timestamp: Utc::now().timestamp_millis(),
        };
        if let Some(frame) = to_frame(&hello)
            && tx.send(Ok(frame)).await.is_err()
        {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = shutdown.cancelled() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(event) => {
                            if event.family_id() != Some(family_id.as_str()) {
                                continue;
                            }
                            let Some(frame) = to_frame(&event) else {
                                continue;
                            };
                            if tx.send(Ok(frame)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(family_id = %family_id, skipped, "realtime: stream lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(family_id = %family_id, "realtime: stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(KeepAlive::new().interval(keepalive).text("keep-alive"))
}
