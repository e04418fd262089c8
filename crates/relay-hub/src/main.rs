//! # relay-hub
//!
//! Broadcast hub binary: loads settings, initializes logging and metrics,
//! and serves the WebSocket relay until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use relay_logging::LogLevel;
use relay_server::{RelayServer, ServerConfig};
use relay_settings::RelaySettings;

/// How long to wait for the listener and sessions after ctrl-c.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Real-time WebSocket broadcast hub.
#[derive(Parser, Debug)]
#[command(name = "relay-hub", about = "Real-time WebSocket broadcast hub")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.relay/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,

    /// Maximum concurrent sessions, 0 for unlimited (overrides settings).
    #[arg(long)]
    max_sessions: Option<usize>,

    /// Don't install the Prometheus recorder or serve `/metrics`.
    #[arg(long)]
    no_metrics: bool,
}

impl Cli {
    /// Fold command-line overrides into loaded settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
        if let Some(max) = self.max_sessions {
            settings.server.max_sessions = max;
        }
    }
}

fn load(cli: &Cli) -> Result<RelaySettings> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(relay_settings::settings_path);
    let mut settings = relay_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;

    let level = LogLevel::from_str_lossy(&settings.logging.level);
    let _ = relay_logging::init_subscriber(level, settings.logging.json);

    let mut server = RelayServer::new(ServerConfig::from(&settings));
    if !cli.no_metrics {
        let handle = relay_server::metrics::install_recorder()
            .context("Failed to install metrics recorder")?;
        server = server.with_metrics(handle);
    }

    let started = Instant::now();
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        mailbox_capacity = settings.server.mailbox_capacity,
        max_sessions = settings.server.max_sessions,
        echo_to_sender = settings.server.echo_to_sender,
        heartbeat = settings.heartbeat.enabled,
        "relay hub ready on ws://{addr}/ws"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!(
        sessions = server.hub().session_count(),
        uptime_secs = started.elapsed().as_secs(),
        "shutting down"
    );
    let drained = server
        .shutdown()
        .graceful_shutdown([handle], Some(SHUTDOWN_TIMEOUT))
        .await;

    tracing::info!(drained, "shutdown complete");
    Ok(())
}
