//! `RelayServer`: Axum HTTP + WebSocket front end for the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::errors::HubError;
use crate::health::{self, HealthResponse};
use crate::hub::websocket::WsAdapter;
use crate::hub::{BroadcastEngine, Hub, Supervisor};
use crate::shutdown::ShutdownCoordinator;

/// Shared state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session lifecycle owner (and through it, the hub).
    pub supervisor: Supervisor,
    /// When the server started.
    pub start_time: Instant,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
    /// Renders `/metrics` when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    supervisor: Supervisor,
    engine: Mutex<Option<BroadcastEngine>>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a server. The broadcast engine starts with [`listen`](Self::listen).
    pub fn new(config: ServerConfig) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (hub, engine) = Hub::new(config.hub.clone(), shutdown.child_token());
        Self {
            config,
            supervisor: Supervisor::new(hub),
            engine: Mutex::new(Some(engine)),
            shutdown,
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            supervisor: self.supervisor.clone(),
            start_time: self.start_time,
            max_message_size: self.config.max_message_size,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/", get(index_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind, start the broadcast engine and serve until shutdown.
    ///
    /// Returns the bound address and a handle that completes once the
    /// listener and the engine have both stopped.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), HubError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let engine = self.engine.lock().take();
        let router = self.router();
        let token = self.shutdown.token();
        info!(%local_addr, "relay hub listening");

        let handle = tokio::spawn(async move {
            let engine = engine.map(|engine| tokio::spawn(engine.run()));
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
            if let Some(engine) = engine {
                let _ = engine.await;
            }
            info!("relay hub stopped");
        });
        Ok((local_addr, handle))
    }

    /// The hub.
    pub fn hub(&self) -> &Arc<Hub> {
        self.supervisor.hub()
    }

    /// The session supervisor.
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn index_handler() -> &'static str {
    "relay hub: connect a WebSocket client to /ws\n"
}

/// Upgrade to a WebSocket and attach the connection as a session.
async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
) -> Response {
    let hub = state.supervisor.hub();
    if hub.is_shutting_down() {
        return HubError::ShuttingDown.into_response();
    }
    if hub.at_capacity() {
        warn!(limit = hub.config().max_sessions, "refusing upgrade, hub at capacity");
        return HubError::AtCapacity {
            limit: hub.config().max_sessions,
        }
        .into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(?rejection, "websocket upgrade rejected");
            return rejection.into_response();
        }
    };

    let supervisor = state.supervisor.clone();
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| async move {
            if let Err(e) = supervisor.attach(WsAdapter::new(socket)).await {
                warn!(error = %e, "failed to attach websocket session");
            }
        })
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let hub = state.supervisor.hub();
    Json(health::health_check(
        state.start_time,
        hub.session_count(),
        hub.config().max_sessions,
        hub.is_shutting_down(),
    ))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    use super::*;
    use crate::config::HubConfig;
    use crate::hub::memory::memory_pair;

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_connections() {
        let server = RelayServer::new(ServerConfig::default());
        let (adapter, _peer) = memory_pair(4);
        let _session = server.supervisor().attach(adapter).await.unwrap();

        let resp = server.router().oneshot(get_req("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connections"], 1);
    }

    #[tokio::test]
    async fn index_serves_banner() {
        let server = RelayServer::new(ServerConfig::default());
        let resp = server.router().oneshot(get_req("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_string(resp).await.contains("/ws"));
    }

    #[tokio::test]
    async fn plain_get_on_ws_is_rejected() {
        let server = RelayServer::new(ServerConfig::default());
        let resp = server.router().oneshot(get_req("/ws")).await.unwrap();
        assert!(resp.status().is_client_error());
        assert!(server.hub().registry().is_empty());
    }

    #[tokio::test]
    async fn ws_at_capacity_is_503() {
        let config = ServerConfig {
            hub: HubConfig {
                max_sessions: 1,
                ..HubConfig::default()
            },
            ..ServerConfig::default()
        };
        let server = RelayServer::new(config);
        let (adapter, _peer) = memory_pair(4);
        let _session = server.supervisor().attach(adapter).await.unwrap();

        let resp = server.router().oneshot(get_req("/ws")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ws_after_shutdown_is_503() {
        let server = RelayServer::new(ServerConfig::default());
        server.shutdown().shutdown();
        let resp = server.router().oneshot(get_req("/ws")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn metrics_404_without_recorder() {
        let server = RelayServer::new(ServerConfig::default());
        let resp = server.router().oneshot(get_req("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_rendered_with_handle() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = RelayServer::new(ServerConfig::default()).with_metrics(handle);
        let resp = server.router().oneshot(get_req("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn listen_binds_and_stops_on_shutdown() {
        let server = RelayServer::new(ServerConfig::default());
        let (addr, handle) = server.listen().await.unwrap();
        assert!(addr.port() > 0);
        server.shutdown().shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn listen_on_taken_port_fails() {
        let first = RelayServer::new(ServerConfig::default());
        let (addr, _handle) = first.listen().await.unwrap();
        let second = RelayServer::new(ServerConfig {
            port: addr.port(),
            ..ServerConfig::default()
        });
        assert!(matches!(second.listen().await, Err(HubError::Io(_))));
        first.shutdown().shutdown();
    }
}
