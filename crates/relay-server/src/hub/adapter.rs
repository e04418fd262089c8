//! Transport seam between a session's pumps and the underlying connection.

use async_trait::async_trait;

use crate::errors::ConnectionError;
use crate::hub::payload::Payload;

/// A bidirectional, message-oriented connection to one client.
///
/// `recv` and `send` may be called concurrently from different tasks (the
/// inbound and outbound pumps); implementations serialize each direction
/// internally. After `close` both directions fail with
/// [`ConnectionError::Closed`].
#[async_trait]
pub trait ConnectionAdapter: Send + Sync {
    /// Wait for the next message from the client.
    async fn recv(&self) -> Result<Payload, ConnectionError>;

    /// Write one message to the client.
    async fn send(&self, payload: Payload) -> Result<(), ConnectionError>;

    /// Close the connection. Safe to call more than once.
    async fn close(&self);

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}
