//! HTTP gateway module: routes, admission middleware and server lifecycle.

mod handlers;
mod middleware;
mod server;

use std::sync::Arc;

use crate::admission::AdmissionBackend;
use crate::config::ServerConfig;

pub use middleware::admission_middleware;
pub use server::{build_router, HttpServer};

/// Shared state handed to handlers and middleware.
pub struct AppState<B> {
    /// Decides whether each request may proceed
    pub backend: Arc<B>,
    /// Name reported by the health endpoint
    pub service_name: Arc<str>,
    /// Key requests by `X-Forwarded-For` instead of the peer address
    pub trust_forwarded_for: bool,
}

impl<B: AdmissionBackend> AppState<B> {
    pub fn new(backend: Arc<B>, server: &ServerConfig) -> Self {
        Self {
            backend,
            service_name: Arc::from(server.service_name.as_str()),
            trust_forwarded_for: server.trust_forwarded_for,
        }
    }
}

// Manual impl: `B` itself need not be `Clone`.
impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            service_name: Arc::clone(&self.service_name),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}
