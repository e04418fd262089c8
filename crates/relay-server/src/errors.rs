//! Error types for connections, mailbox delivery and session attachment.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure of a connection adapter's `recv` or `send`.
///
/// A peer-initiated close is reported as [`ConnectionError::Closed`]; it ends
/// only the affected session.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The connection was closed, by the peer or locally.
    #[error("connection closed")]
    Closed,
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Failure of a non-blocking mailbox enqueue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The mailbox is at capacity; the consumer is not keeping up.
    #[error("mailbox full")]
    Full,
    /// The mailbox was closed; the session is being torn down.
    #[error("mailbox closed")]
    Closed,
}

/// Errors surfaced when attaching a new client to the hub.
#[derive(Debug, Error)]
pub enum HubError {
    /// The configured session limit has been reached.
    #[error("hub is at capacity ({limit} sessions)")]
    AtCapacity {
        /// Configured maximum.
        limit: usize,
    },
    /// The hub is shutting down and accepts no new sessions.
    #[error("hub is shutting down")]
    ShuttingDown,
    /// The connection failed during setup (e.g. sending the greeting).
    #[error("connection failed during setup: {0}")]
    Connection(#[from] ConnectionError),
    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HubError {
    /// HTTP status reported to the client for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AtCapacity { .. } | Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Connection(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_display() {
        assert_eq!(ConnectionError::Closed.to_string(), "connection closed");
        assert_eq!(
            ConnectionError::Transport("reset".into()).to_string(),
            "transport error: reset"
        );
    }

    #[test]
    fn delivery_error_display() {
        assert_eq!(DeliveryError::Full.to_string(), "mailbox full");
        assert_eq!(DeliveryError::Closed.to_string(), "mailbox closed");
    }

    #[test]
    fn capacity_maps_to_503() {
        let err = HubError::AtCapacity { limit: 4 };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains('4'));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn shutting_down_maps_to_503() {
        assert_eq!(
            HubError::ShuttingDown.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn connection_error_converts() {
        let err: HubError = ConnectionError::Closed.into();
        assert!(matches!(err, HubError::Connection(ConnectionError::Closed)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
