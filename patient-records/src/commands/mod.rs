//! Commands exposed to the user interface layer
//!
//! This module organizes commands into logical submodules:
//! - `patients`: Patient CRUD and sync flags
//! - `doctors`: Doctor CRUD and sync flags
//! - `settings`: Sync settings
//!
//! Image and sync-queue commands live here.

pub mod doctors;
pub mod patients;
pub mod settings;

use crate::app::AppState;
use crate::database::{SyncAction, SyncQueueEntry};
use crate::error::Result;
use crate::services::SyncReport;
use serde::Serialize;
use std::path::Path;

pub use doctors::*;
pub use patients::*;
pub use settings::*;

// ===== General Commands =====

/// Get application information
pub async fn get_app_info(state: &AppState) -> Result<AppInfo> {
    Ok(AppInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        app_data_dir: state.app_data_dir.to_string_lossy().to_string(),
    })
}

/// Application information structure
#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub version: String,
    pub app_data_dir: String,
}

// ===== Images =====

/// Store a patient photo from a `data:` URI; returns the file path
pub async fn save_image(state: &AppState, image_data: String, patient_id: i64) -> Result<String> {
    let path = state
        .patients_service
        .images()
        .save_encoded(&image_data, patient_id)
        .await?;
    Ok(path.to_string_lossy().to_string())
}

/// Remove an image file; false when nothing was removed
pub async fn delete_image(state: &AppState, image_path: String) -> Result<bool> {
    Ok(state
        .patients_service
        .images()
        .delete(Path::new(&image_path))
        .await)
}

// ===== Sync Queue =====

/// Record a mutation in the sync queue outside of a record write
pub async fn append_to_outbox(
    state: &AppState,
    table_name: String,
    record_id: i64,
    action: String,
    data: serde_json::Value,
) -> Result<i64> {
    let action: SyncAction = action.parse()?;
    state
        .outbox
        .append(&table_name, record_id, action, &data)
        .await
}

/// Unprocessed sync-queue entries, oldest first
pub async fn list_pending_sync(state: &AppState) -> Result<Vec<SyncQueueEntry>> {
    state.outbox.pull_unprocessed().await
}

/// Drain the sync queue now
pub async fn process_sync_queue(state: &AppState) -> Result<SyncReport> {
    state.sync_service.process_once().await
}
