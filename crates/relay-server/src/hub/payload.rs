//! Opaque relayed payloads and session identifiers.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

/// Unique identifier for one client session.
///
/// Fresh per connection and never reused while the hub runs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a new time-ordered identifier (`client_<uuid v7>`).
    pub fn new() -> Self {
        Self(format!("client_{}", Uuid::now_v7()))
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message bytes relayed as-is between clients.
///
/// Cloning is cheap: text shares an `Arc<str>` and binary shares `Bytes`, so
/// one inbound message fans out without copying its body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// A UTF-8 text frame.
    Text(Arc<str>),
    /// A binary frame.
    Binary(Bytes),
}

impl Payload {
    /// Build a text payload.
    pub fn text(s: impl Into<Arc<str>>) -> Self {
        Self::Text(s.into())
    }

    /// Build a binary payload.
    pub fn binary(b: impl Into<Bytes>) -> Self {
        Self::Binary(b.into())
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of either kind.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    /// The text, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// Frame kind, for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }

    /// Truncated, lossy rendering for log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        let full = String::from_utf8_lossy(self.as_bytes());
        if full.chars().count() <= max_chars {
            return full.into_owned();
        }
        let mut out: String = full.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Self::Binary(b)
    }
}
