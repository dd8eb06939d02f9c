//! Service bootstrap.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use payment_reconciler::adapters::http::{app_router, PaymentAppState};
use payment_reconciler::adapters::midtrans::{MidtransSnapClient, MockPaymentGateway};
use payment_reconciler::adapters::postgres::{
    PostgresBillingRecordWriter, PostgresEnrollmentWriter, PostgresGatewayEventLedger,
    PostgresPaymentRepository, PostgresTargetReader,
};
use payment_reconciler::config::AppConfig;
use payment_reconciler::ports::PaymentGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    init_tracing(&config);

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await
        .context("connecting to database")?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running migrations")?;
        tracing::info!("Migrations applied");
    }

    let payment_gateway: Arc<dyn PaymentGateway> = if config.gateway.use_mock {
        tracing::warn!("Using mock payment gateway");
        Arc::new(MockPaymentGateway::new())
    } else {
        Arc::new(MidtransSnapClient::new(config.gateway.midtrans()))
    };

    let state = PaymentAppState {
        payment_repository: Arc::new(PostgresPaymentRepository::new(pool.clone())),
        gateway_event_ledger: Arc::new(PostgresGatewayEventLedger::new(pool.clone())),
        target_reader: Arc::new(PostgresTargetReader::new(pool.clone())),
        billing_writer: Arc::new(PostgresBillingRecordWriter::new(pool.clone())),
        enrollment_writer: Arc::new(PostgresEnrollmentWriter::new(pool)),
        payment_gateway,
        signature_verifier: config.gateway.signature_verifier(),
        checkout_expiry_minutes: config.gateway.checkout_expiry_minutes,
    };

    let app = app_router(state, config.server.request_timeout());
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        gateway = ?config.gateway,
        "Payment reconciler listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
