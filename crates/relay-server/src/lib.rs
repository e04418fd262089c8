//! # relay-server
//!
//! Real-time message broadcast hub over WebSocket.
//!
//! Every message received from any connected client is relayed to every
//! connected client. Each client has a bounded outbound mailbox drained by
//! its own task; a client whose mailbox fills up is disconnected so the
//! rest of the hub keeps flowing.
//!
//! - [`hub`]: registry, broadcast engine, sessions and their supervisor
//! - [`server`]: Axum router (`/ws`, `/health`, `/metrics`) and listener
//! - [`shutdown`]: cancellation tree shared by every task

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod hub;
pub mod metrics;
pub mod server;
pub mod shutdown;

pub use config::{HeartbeatConfig, HubConfig, ServerConfig};
pub use errors::{ConnectionError, DeliveryError, HubError};
pub use server::RelayServer;
