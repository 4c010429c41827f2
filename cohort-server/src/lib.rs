//! cohort-server - HTTP surface for the cohort learning session core
//!
//! Routing and transport only: every domain rule lives in cohort-core, and
//! every recoverable domain error leaves here as a 4xx with a stable
//! machine-readable code.

mod error;
pub mod http;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use cohort_core::CoreConfig;
use thiserror::Error;
use tokio::net::TcpListener;

pub use error::{ApiError, ErrorBody};
pub use http::create_router;
pub use state::{AppState, ReceiptCertificateIssuer};

/// Errors that can occur while running the server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Serving failed
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Server binding configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The cohort HTTP server
pub struct CohortServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl CohortServer {
    /// Create a new server with default state
    pub fn new(config: ServerConfig, core_config: CoreConfig) -> Self {
        Self {
            config,
            state: Arc::new(AppState::new(core_config)),
        }
    }

    /// Create a server around existing state (tests, embedded use)
    pub fn with_state(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Shared state handle, for seeding content before serving
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Bind and serve until the process is stopped
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr).await.map_err(|source| {
            ServerError::Bind {
                addr: addr.clone(),
                source,
            }
        })?;

        let local: SocketAddr = listener.local_addr().map_err(ServerError::Serve)?;
        tracing::info!(%local, "cohort server listening");

        let router = create_router(self.state);
        axum::serve(listener, router)
            .await
            .map_err(ServerError::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_localhost() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:8090");
    }
}
