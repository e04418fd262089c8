//! # relay-settings
//!
//! Relay hub settings. Later layers win:
//!
//! 1. [`RelaySettings::default()`]
//! 2. `~/.relay/settings.json`, merged key by key over the defaults
//! 3. `RELAY_*` environment variables
//!
//! # Usage
//!
//! ```no_run
//! use relay_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("listening on port {}", settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, merge_into, settings_path};
pub use types::*;
