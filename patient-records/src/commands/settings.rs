//! Settings-related commands

use crate::app::AppState;
use crate::error::Result;
use crate::services::SyncSettings;

/// Get current sync settings
pub async fn get_sync_settings(state: &AppState) -> Result<SyncSettings> {
    state.settings_service.get_sync().await
}

/// Update sync settings
/// Note: the running processor keeps its interval until restart
pub async fn update_sync_settings(state: &AppState, sync: SyncSettings) -> Result<()> {
    state.settings_service.update_sync(sync).await?;

    tracing::warn!("Sync settings updated. Restart required for the new interval to take effect.");

    Ok(())
}
