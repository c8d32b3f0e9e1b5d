//! Database module
//!
//! This module provides all database functionality including:
//! - Schema and migrations
//! - Model definitions
//! - Row-level queries for patients and doctors
//! - The sync outbox

pub mod models;
pub mod outbox;
pub mod repository;
pub mod schema;

pub use models::*;
pub use outbox::SyncOutbox;
pub use repository::Repository;
pub use schema::initialize_database;

use crate::config;
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Build connection options for the database file.
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(config::DATABASE_BUSY_TIMEOUT)
                .journal_mode(SqliteJournalMode::Wal)
        },
    )
}

/// Single-connection pool options.
///
/// Exactly one connection is ever open and it is never recycled, so
/// transactions are strictly serialized and an in-memory database lives
/// as long as the pool.
fn single_connection() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

/// Open the database file and ensure its schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Opening database at: {:?}", db_path);

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = single_connection()
        .connect_with(connect_options(db_path)?)
        .await?;

    initialize_database(&pool).await?;

    tracing::info!("Database opened successfully");

    Ok(pool)
}

/// Create an in-memory database with the full schema (tests, previews).
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let pool = single_connection().connect("sqlite::memory:").await?;
    initialize_database(&pool).await?;
    Ok(pool)
}
