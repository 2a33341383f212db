use anyhow::{Context, Result};
use kyc_analysis::{
    start_api_server, AppState, BedrockInferenceClient, Config, DynamoDbAnalysisStore,
    KycAnalyzer, S3DocumentStore,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        bucket = %config.s3.bucket,
        table = %config.dynamodb.table,
        "Starting KYC analysis service"
    );

    init_metrics(config.service.metrics_port)?;

    let documents = Arc::new(S3DocumentStore::new(&config.s3).await);
    let model = Arc::new(BedrockInferenceClient::new(&config.inference).await);
    let records = Arc::new(DynamoDbAnalysisStore::new(&config.dynamodb).await);

    let state = AppState {
        service_name: config.service.name.clone(),
        analyzer: KycAnalyzer::new(documents, model, records, &config.inference),
    };

    // Bind failures end the process
    start_api_server(state, &config.api, shutdown_signal())
        .await
        .context("KYC analysis API stopped")?;

    info!("KYC analysis service stopped");

    Ok(())
}

/// JSON logs, filtered by `RUST_LOG` or the configured level
fn init_tracing(log_level: &str) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(log_level),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_current_span(true))
        .init();
}

/// Expose `/metrics` for Prometheus on `port`
fn init_metrics(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to start metrics listener on port {}", port))?;

    info!(port, "Metrics listener started");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM, starting a graceful drain of in-flight
/// analyses. A signal handler that cannot be installed never resolves.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!(signal = "SIGINT", "Shutting down KYC analysis service"),
        _ = terminate => info!(signal = "SIGTERM", "Shutting down KYC analysis service"),
    }
}
