//! [`ConnectionAdapter`] over an upgraded Axum WebSocket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::errors::ConnectionError;
use crate::hub::adapter::ConnectionAdapter;
use crate::hub::payload::Payload;

/// How long `close` waits for the close frame to flush.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket split into independently locked halves.
pub struct WsAdapter {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
    closed: CancellationToken,
    close_started: AtomicBool,
}

impl WsAdapter {
    /// Wrap an upgraded socket.
    pub fn new(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: CancellationToken::new(),
            close_started: AtomicBool::new(false),
        }
    }
}

fn to_message(payload: Payload) -> Message {
    match payload {
        Payload::Text(s) => Message::Text(String::from(&*s).into()),
        Payload::Binary(b) => Message::Binary(b),
    }
}

#[async_trait]
impl ConnectionAdapter for WsAdapter {
    async fn recv(&self) -> Result<Payload, ConnectionError> {
        let mut stream = tokio::select! {
            biased;
            () = self.closed.cancelled() => return Err(ConnectionError::Closed),
            guard = self.stream.lock() => guard,
        };
        loop {
            let next = tokio::select! {
                biased;
                () = self.closed.cancelled() => return Err(ConnectionError::Closed),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(Message::Text(text))) => return Ok(Payload::text(text.as_str())),
                Some(Ok(Message::Binary(data))) => return Ok(Payload::Binary(data)),
                // Pings are answered by the protocol layer.
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    trace!("control frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "peer sent close frame");
                    return Err(ConnectionError::Closed);
                }
                None => return Err(ConnectionError::Closed),
                Some(Err(e)) => return Err(ConnectionError::Transport(e.to_string())),
            }
        }
    }

    async fn send(&self, payload: Payload) -> Result<(), ConnectionError> {
        let mut sink = tokio::select! {
            biased;
            () = self.closed.cancelled() => return Err(ConnectionError::Closed),
            guard = self.sink.lock() => guard,
        };
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(ConnectionError::Closed),
            res = sink.send(to_message(payload)) => {
                res.map_err(|e| ConnectionError::Transport(e.to_string()))
            }
        }
    }

    async fn close(&self) {
        if self.close_started.swap(true, Ordering::AcqRel) {
            return;
        }
        // Wakes any recv/send parked on the socket so the lock below is free.
        self.closed.cancel();
        let mut sink = self.sink.lock().await;
        let flushed = tokio::time::timeout(CLOSE_TIMEOUT, async {
            let _ = sink.send(Message::Close(None)).await;
            sink.close().await
        })
        .await;
        if flushed.is_err() {
            debug!("close frame not flushed before timeout");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_maps_to_text_frame() {
        match to_message(Payload::text("hi")) {
            Message::Text(t) => assert_eq!(t.as_str(), "hi"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn binary_maps_to_binary_frame() {
        match to_message(Payload::binary(vec![1u8, 2, 3])) {
            Message::Binary(b) => assert_eq!(&b[..], &[1, 2, 3]),
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
