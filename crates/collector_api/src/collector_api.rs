use crate::domain::StatIngestionService;
use crate::http::{run_collector_http_server, HttpServerConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct CollectorApi {
    ingestion_service: Arc<StatIngestionService>,
    config: HttpServerConfig,
}

impl CollectorApi {
    pub fn new(ingestion_service: Arc<StatIngestionService>, config: HttpServerConfig) -> Self {
        debug!("Initializing collector API module");
        Self {
            ingestion_service,
            config,
        }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| {
            Box::pin(async move {
                run_collector_http_server(self.config, self.ingestion_service, ctx).await
            })
        }
    }
}
