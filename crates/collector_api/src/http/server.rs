use crate::domain::StatIngestionService;
use crate::http::{collect, health};
use axum::routing::{get, post};
use axum::Router;
use common::http::{HttpLoggingConfig, HttpLoggingLayer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub logging_config: HttpLoggingConfig,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            logging_config: HttpLoggingConfig::default(),
        }
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct CollectorState {
    pub ingestion_service: Arc<StatIngestionService>,
}

/// Build the collector router with request logging
pub fn build_router(
    ingestion_service: Arc<StatIngestionService>,
    logging_config: HttpLoggingConfig,
) -> Router {
    Router::new()
        .route("/collector", post(collect))
        .route("/health", get(health))
        .layer(HttpLoggingLayer::new(logging_config))
        .with_state(CollectorState { ingestion_service })
}

/// Run the HTTP server until the cancellation token fires
pub async fn run_collector_http_server(
    config: HttpServerConfig,
    ingestion_service: Arc<StatIngestionService>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    let router = build_router(ingestion_service, config.logging_config);

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        cancellation_token.cancelled().await;
        info!("HTTP server shutdown signal received");
    });

    match server.await {
        Ok(()) => {
            info!("HTTP server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!("HTTP server error: {}", e);
            Err(e.into())
        }
    }
}
