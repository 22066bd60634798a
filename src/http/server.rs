//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::handlers;
use super::middleware::admission_middleware;
use super::AppState;
use crate::admission::AdmissionBackend;
use crate::error::{GatekeeperError, Result};

/// Build the gateway router. Every route, the fallback included, passes the
/// admission check first.
pub fn build_router<B: AdmissionBackend + 'static>(state: AppState<B>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::<B>))
        .route("/api/v1", get(handlers::api_v1))
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(state.clone(), admission_middleware::<B>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server for the gateway.
pub struct HttpServer<B: AdmissionBackend + 'static> {
    /// Address to bind to
    addr: SocketAddr,
    /// Handler and middleware state
    state: AppState<B>,
}

impl<B: AdmissionBackend + 'static> HttpServer<B> {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, state: AppState<B>) -> Self {
        Self { addr, state }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            GatekeeperError::Io(e)
        })?;

        self.serve_listener(listener, signal).await
    }

    /// Serve on an already bound listener until `signal` resolves.
    ///
    /// In-flight requests are allowed to finish before this returns.
    pub async fn serve_listener<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Starting HTTP server with graceful shutdown");

        let app = build_router(self.state).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                GatekeeperError::Io(e)
            })?;

        info!("HTTP server stopped");
        Ok(())
    }
}
