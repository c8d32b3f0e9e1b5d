//! Commit / rollback protocol shared by the record services
//!
//! A record write runs `begin → row → image → outbox` on one transaction.
//! This module ends that sequence: commit on success, rollback on failure,
//! and in either failure case remove the image file the write produced.

use crate::error::{AppError, Result};
use crate::storage::ImageStore;
use sqlx::{Sqlite, Transaction};
use std::path::{Path, PathBuf};

/// Finish a write transaction, compensating for `written` if it does not commit.
pub async fn commit_or_compensate<T>(
    tx: Transaction<'static, Sqlite>,
    outcome: Result<T>,
    written: Option<PathBuf>,
    images: &ImageStore,
) -> Result<T> {
    let result = match outcome {
        Ok(value) => tx.commit().await.map(|()| value).map_err(AppError::from),
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    };

    if let Err(e) = &result {
        tracing::warn!("Write rolled back: {}", e);
        if let Some(path) = written {
            if images.delete(&path).await {
                tracing::debug!("Removed image written by rolled back operation: {:?}", path);
            } else {
                tracing::warn!("Could not remove orphaned image: {:?}", path);
            }
        }
    }

    result
}

/// Best-effort removal of a record's previous image after a committed write.
pub async fn discard_image(images: &ImageStore, stored_path: &str) {
    let Some(path) = images.locate(stored_path) else {
        tracing::debug!("No image left to remove for {}", stored_path);
        return;
    };

    if !images.delete(&path).await {
        tracing::warn!("Stale image kept on disk: {:?}", path);
    }
}

/// Stored form of an image path
pub fn path_to_column(path: &Path) -> Result<String> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        AppError::ImageWriteFailed(format!("path is not valid UTF-8: {:?}", path))
    })
}
