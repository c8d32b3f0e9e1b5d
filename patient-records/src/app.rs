//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config::{DATABASE_FILE_NAME, DOCTOR_IMAGES_DIR, PATIENT_IMAGES_DIR};
use crate::database::{self, Repository, SyncOutbox};
use crate::error::Result;
use crate::services::{
    AlwaysOnline, AppSettings, ConnectivityProbe, DoctorsService, HttpProbe, PatientsService,
    SettingsService, SimulatedRemote, SyncService,
};
use crate::storage::ImageStore;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub pool: SqlitePool,
    pub outbox: SyncOutbox,
    pub patients_service: PatientsService,
    pub doctors_service: DoctorsService,
    pub settings_service: SettingsService,
    pub settings: AppSettings,
    pub sync_service: SyncService,
}

impl AppState {
    /// Open (or create) the store under `app_data_dir` and wire all services
    pub async fn initialize(app_data_dir: PathBuf) -> Result<Self> {
        tracing::info!("Initializing application");

        let app_data_dir = std::path::absolute(&app_data_dir)?;
        tracing::info!("App data directory: {:?}", app_data_dir);

        tokio::fs::create_dir_all(&app_data_dir).await?;

        let settings_service = SettingsService::new(app_data_dir.clone());
        let settings = settings_service.load().await?;

        let pool = database::create_pool(&app_data_dir.join(DATABASE_FILE_NAME)).await?;
        let repo = Repository::new(pool.clone());
        let outbox = SyncOutbox::new(pool.clone());

        let patient_images = ImageStore::new(app_data_dir.join(PATIENT_IMAGES_DIR), "patient");
        patient_images.initialize().await?;
        let doctor_images = ImageStore::new(app_data_dir.join(DOCTOR_IMAGES_DIR), "doctor");
        doctor_images.initialize().await?;

        let probe: Arc<dyn ConnectivityProbe> = match HttpProbe::new(&settings.sync.probe_url) {
            Ok(probe) => Arc::new(probe),
            Err(e) => {
                tracing::warn!("Connectivity probe disabled: {}", e);
                Arc::new(AlwaysOnline)
            }
        };

        let sync_service = SyncService::new(
            repo.clone(),
            outbox.clone(),
            probe,
            Arc::new(SimulatedRemote),
        );

        let state = Self {
            app_data_dir,
            pool,
            outbox,
            patients_service: PatientsService::new(repo.clone(), patient_images),
            doctors_service: DoctorsService::new(repo, doctor_images),
            settings_service,
            settings,
            sync_service,
        };

        tracing::info!("Application initialized successfully");

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_initialize_creates_layout() {
        let temp = TempDir::new().unwrap();

        let state = AppState::initialize(temp.path().to_path_buf()).await.unwrap();

        assert!(temp.path().join("doctor-app.db").exists());
        assert!(temp.path().join("patient_images").is_dir());
        assert!(temp.path().join("doctor_images").is_dir());
        assert!(temp.path().join("settings.json").exists());
        assert!(state.settings.sync.enabled);
    }

    #[tokio::test]
    async fn test_relative_data_dir_is_anchored() {
        let relative = PathBuf::from(format!(".app-data-{}", uuid::Uuid::new_v4().simple()));

        let state = AppState::initialize(relative.clone()).await.unwrap();
        assert!(state.app_data_dir.is_absolute());
        assert!(state.app_data_dir.ends_with(&relative));
        assert!(state.patients_service.images().root().is_absolute());

        state.pool.close().await;
        std::fs::remove_dir_all(&state.app_data_dir).unwrap();
    }
}
