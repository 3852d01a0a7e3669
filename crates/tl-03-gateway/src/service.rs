//! Gateway service: validates configuration, builds the router, runs the
//! HTTP server until shutdown.

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tl_02_ingestion::IngestionApi;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::auth::ApiKeyAuthenticator;
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::registry::ClientRegistry;
use crate::router::{build_router, GatewayState};

/// HTTP gateway service state
pub struct GatewayService {
    config: GatewayConfig,
    state: GatewayState,
}

impl GatewayService {
    /// Create a new gateway service
    pub fn new(
        config: GatewayConfig,
        ingestion: Arc<dyn IngestionApi>,
        registry: Arc<ClientRegistry>,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let state = GatewayState {
            ingestion,
            registry,
            authenticator: Arc::new(ApiKeyAuthenticator::new(config.credentials.clone())),
            retry_after_secs: config.retry_after_secs,
        };

        Ok(Self { config, state })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Router serving the submission endpoint
    pub fn router(&self) -> Router {
        build_router(
            &self.config.path,
            self.config.max_body_bytes,
            self.state.clone(),
        )
    }

    /// Bind the listener and serve in the background.
    pub async fn start(&self) -> Result<RunningGateway, GatewayError> {
        let listener = tokio::net::TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{}: {}", self.config.listen_addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = self.router();

        info!(addr = %local_addr, path = %self.config.path, "Starting HTTP gateway");
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(RunningGateway {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            server,
        })
    }
}

/// Handle to a serving gateway.
pub struct RunningGateway {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: JoinHandle<std::io::Result<()>>,
}

impl RunningGateway {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) -> Result<(), GatewayError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.server.await {
            Ok(Ok(())) => {
                info!("HTTP gateway stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "HTTP server error");
                Err(GatewayError::Internal(e.to_string()))
            }
            Err(e) => Err(GatewayError::Internal(e.to_string())),
        }
    }
}
