//! Errors from reading and checking settings.

use thiserror::Error;

/// Why settings could not be produced.
///
/// A missing file is not an error (defaults apply); an unreadable or
/// malformed one is.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON, or a field has the wrong type.
    #[error("malformed settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A field parsed but holds a value the hub cannot run with.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted camelCase path, e.g. `server.mailboxCapacity`.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Shorthand for settings results.
pub type Result<T> = std::result::Result<T, SettingsError>;
