use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use payflow_backend::api::{self, AppState};
use payflow_backend::config::AppConfig;
use payflow_backend::database;
use payflow_backend::database::payment_repository::PgPaymentRepository;
use payflow_backend::logging::init_tracing;
use payflow_backend::processor::client::{StripeClient, StripeConfig};
use payflow_backend::services::payment_service::PaymentService;
use payflow_backend::services::webhook_processor::WebhookProcessor;
use payflow_backend::workers::payment_sweeper::{PaymentSweeper, SweeperConfig};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting payflow backend service"
    );

    let db_pool = database::init_pool_from_config(&config.database)
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            anyhow::anyhow!(e)
        })?;

    let stripe_config = StripeConfig::from_env().map_err(|e| {
        error!("Failed to load processor configuration: {}", e);
        anyhow::anyhow!(e)
    })?;
    let webhook_secret = stripe_config.webhook_secret.clone();
    let webhook_tolerance = stripe_config.webhook_tolerance_secs;
    let stripe_client = Arc::new(StripeClient::new(stripe_config).map_err(|e| {
        error!("Failed to initialize processor client: {}", e);
        anyhow::anyhow!(e)
    })?);

    let store = Arc::new(PgPaymentRepository::new(db_pool.clone()));
    let payment_service = Arc::new(PaymentService::new(
        store,
        stripe_client,
        config.payments.min_amount,
    ));
    let webhook_processor = Arc::new(WebhookProcessor::new(
        payment_service.clone(),
        webhook_secret,
        webhook_tolerance,
    ));

    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let sweeper_config = SweeperConfig::from_env();
    let mut sweeper_handle = None;
    if sweeper_config.enabled {
        info!(
            interval_secs = sweeper_config.interval.as_secs(),
            "Starting payment sweeper worker"
        );
        let sweeper = PaymentSweeper::new(payment_service.clone(), sweeper_config);
        sweeper_handle = Some(tokio::spawn(sweeper.run(worker_shutdown_rx)));
    } else {
        info!("Payment sweeper disabled (SWEEPER_ENABLED=false)");
    }

    let state = AppState {
        payments: payment_service,
        webhooks: webhook_processor,
        db_pool,
    };

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if let Some(handle) = sweeper_handle {
        if let Err(e) = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await {
            error!(error = %e, "Timed out waiting for sweeper shutdown");
        }
    }

    info!("Server shutdown complete");

    Ok(())
}
