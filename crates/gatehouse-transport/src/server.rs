//! HTTP/HTTPS transport server using Axum.
//!
//! Every request outside the health route is converted into an
//! [`InboundRequest`] and handed to the [`RequestHandler`]. A handler error
//! is a [`Fault`] and becomes the fault response here; the handler never
//! has to render its own errors.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use gatehouse_protocol::{Fault, InboundRequest, OutboundResponse, Routes};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// How long in-flight requests may run after [`TransportServer::stop`].
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Trait implemented by the host dispatcher to handle incoming requests.
/// The transport calls this for every request outside its own routes.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle_request(
        &self,
        request: InboundRequest,
    ) -> impl std::future::Future<Output = Result<OutboundResponse, Fault>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),

    #[error("failed to load TLS certificate: {0}")]
    Tls(#[source] std::io::Error),

    #[error("failed to bind {0}")]
    BindFailed(SocketAddr),
}

/// PEM files used for TLS termination.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Address to bind to
    pub hostname: String,
    /// TLS termination; plain HTTP when `None`
    pub tls: Option<TlsConfig>,
    /// Largest request body accepted
    pub max_body_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            hostname: "0.0.0.0".into(),
            tls: None,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Shared state for the transport server.
struct AppState<H: RequestHandler> {
    handler: Arc<H>,
    config: TransportConfig,
    /// Requests handed to the handler (for health check)
    requests: AtomicU64,
}

/// The transport server. Owns the listener task.
pub struct TransportServer {
    handle: Handle,
    task: Option<tokio::task::JoinHandle<()>>,
    local_addr: SocketAddr,
    tls: bool,
}

impl TransportServer {
    /// Start the transport server with the given request handler.
    pub async fn start<H: RequestHandler>(
        config: TransportConfig,
        handler: H,
    ) -> Result<Self, TransportError> {
        Self::start_with_handler(config, Arc::new(handler)).await
    }

    /// Start the transport server with a shared handler.
    pub async fn start_with_handler<H: RequestHandler>(
        config: TransportConfig,
        handler: Arc<H>,
    ) -> Result<Self, TransportError> {
        let ip: IpAddr = config
            .hostname
            .parse()
            .map_err(|_| TransportError::InvalidAddress(config.hostname.clone()))?;
        let addr = SocketAddr::new(ip, config.port);

        let tls = match &config.tls {
            Some(tls) => Some(
                RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                    .await
                    .map_err(TransportError::Tls)?,
            ),
            None => None,
        };
        let is_tls = tls.is_some();

        let state = Arc::new(AppState {
            handler,
            config,
            requests: AtomicU64::new(0),
        });

        let app = Router::new()
            .route(Routes::HEALTH, get(health_handler::<H>))
            .fallback(dispatch_handler::<H>)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CatchPanicLayer::new()),
            )
            .with_state(state);

        let handle = Handle::new();
        let server_handle = handle.clone();
        let task = tokio::spawn(async move {
            let result = match tls {
                Some(rustls) => {
                    axum_server::bind_rustls(addr, rustls)
                        .handle(server_handle)
                        .serve(app.into_make_service())
                        .await
                }
                None => {
                    axum_server::bind(addr)
                        .handle(server_handle)
                        .serve(app.into_make_service())
                        .await
                }
            };
            if let Err(e) = result {
                error!("Transport server error on {addr}: {e}");
            }
        });

        let local_addr = handle
            .listening()
            .await
            .ok_or(TransportError::BindFailed(addr))?;

        let scheme = if is_tls { "https" } else { "http" };
        info!("Gatehouse transport listening on {scheme}://{local_addr}");

        Ok(Self {
            handle,
            task: Some(task),
            local_addr,
            tls: is_tls,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Gracefully stop the server, letting in-flight requests finish.
    pub async fn stop(&mut self) {
        self.handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("Gatehouse transport server stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn health_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "requests": state.requests.load(Ordering::Relaxed),
    }))
}

async fn dispatch_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let limit = state.config.max_body_bytes;

    let body = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Rejected request body: {e}");
            return into_http(OutboundResponse::fault(&Fault::payload_too_large(limit)));
        }
    };

    let inbound = InboundRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body,
    };

    state.requests.fetch_add(1, Ordering::Relaxed);

    match state.handler.handle_request(inbound).await {
        Ok(response) => into_http(response),
        Err(fault) => {
            warn!("Request faulted: {fault}");
            into_http(OutboundResponse::fault(&fault))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn into_http(response: OutboundResponse) -> Response {
    let mut http = Response::new(Body::from(response.body));
    *http.status_mut() = response.status;
    *http.headers_mut() = response.headers;
    http
}
