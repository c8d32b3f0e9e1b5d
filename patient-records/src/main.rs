// Patient records - headless host for the persistence core
// Entry point and application setup

use anyhow::Context;
use patient_records::app::AppState;
use patient_records::config::DATA_DIR_ENV;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "patient_records=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting patient records");

    let app_data_dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let state = AppState::initialize(app_data_dir)
        .await
        .context("Failed to initialize application")?;

    let processor = if state.settings.sync.enabled {
        Some(state.sync_service.clone().start(state.settings.sync.interval()))
    } else {
        tracing::info!("Background sync disabled in settings");
        None
    };

    let patients = state.patients_service.list_patients().await?.len();
    let doctors = state.doctors_service.list_doctors().await?.len();
    let pending = state.outbox.count_unprocessed().await?;
    tracing::info!(
        "Store ready: {} patients, {} doctors, {} pending sync entries",
        patients,
        doctors,
        pending
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down");
    if let Some(handle) = processor {
        handle.abort();
    }
    state.pool.close().await;

    Ok(())
}
