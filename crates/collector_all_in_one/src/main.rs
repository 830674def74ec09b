mod config;

use collector_api::collector_api::CollectorApi;
use collector_api::domain::StatIngestionService;
use collector_api::http::HttpServerConfig;
use collector_runner::Runner;
use common::domain::AttributeRecordStore;
use common::http::HttpLoggingConfig;
use common::postgres::{MigrationRunner, PostgresAttributeRecordStore, PostgresClient};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use crate::config::ServiceConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        otel_enabled = config.otel_enabled,
        http_port = config.http_port,
        "Starting collector service"
    );
    debug!("Configuration: {:?}", config);

    let store = match initialize_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize PostgreSQL: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let ingestion_service = Arc::new(StatIngestionService::new(store));

    let collector_api = CollectorApi::new(
        ingestion_service,
        HttpServerConfig {
            host: config.http_host.clone(),
            port: config.http_port,
            logging_config: HttpLoggingConfig::from_comma_separated(&config.http_ignored_paths),
        },
    );

    let outcome = Runner::new()
        .with_named_process("collector_api", collector_api.into_runner_process())
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            // Flush pending spans before exit
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await;

    std::process::exit(outcome.exit_code());
}

async fn initialize_store(
    config: &ServiceConfig,
) -> anyhow::Result<Arc<dyn AttributeRecordStore>> {
    let postgres_config = config.postgres_config();

    info!("Running PostgreSQL migrations...");
    MigrationRunner::from_config(&postgres_config)
        .run_migrations()
        .await?;

    let client = PostgresClient::new(&postgres_config)?;
    client.ping().await?;
    info!(
        "Connected to PostgreSQL at {}:{}",
        config.postgres_host, config.postgres_port
    );

    Ok(Arc::new(PostgresAttributeRecordStore::new(client)))
}
