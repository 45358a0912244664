//! Donation ledger service: entry point.
//!
//! Serves the campaign / donation / subscription REST API and the Paystack
//! webhook, with two background tasks alongside: the notification worker and
//! the sweeper that expires abandoned online donations.

mod analytics;
mod api;
mod auth;
mod config;
mod db;
mod duplicate;
mod errors;
mod gateway;
mod ledger;
mod models;
mod notify;
mod receipt;
mod reconcile;
mod schedule;
mod subscriptions;
mod sweeper;
mod webhook;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use gateway::{DisabledGateway, PaymentGateway, PaystackGateway};
use ledger::{Ledger, LedgerSettings};
use notify::{LogNotifier, NotificationQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

    let gateway: Arc<dyn PaymentGateway> = match &config.paystack_secret_key {
        Some(key) => Arc::new(PaystackGateway::new(client, &config.paystack_base_url, key)),
        None => Arc::new(DisabledGateway),
    };
    if config.test_mode() {
        warn!("PAYSTACK_SECRET_KEY not set: payments are not taken and webhooks are refused");
    }

    // ─── Background tasks ─────────────────────────────────
    let (notifications, receiver) = NotificationQueue::new(config.notification_queue_size);
    let notifier = tokio::spawn(notify::run(receiver, Arc::new(LogNotifier)));

    let ledger = Ledger::new(
        pool,
        gateway,
        notifications,
        LedgerSettings::from_config(&config),
    );

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(sweeper::run(
        ledger.clone(),
        Duration::from_secs(config.sweep_interval_secs.max(1)),
        shutdown.clone(),
    ));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState {
        ledger,
        webhook_secret: config.paystack_secret_key.clone(),
    });
    let app = api::router(api_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    sweeper.await?;
    // The worker exits once the last queue handle is dropped.
    if tokio::time::timeout(Duration::from_secs(5), notifier).await.is_err() {
        warn!("Notification worker did not drain in time");
    }
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    token.cancel();
}
