//! Schema manager
//!
//! Brings any patient-records database up to the current schema. Databases
//! written before version tracking existed are adopted in place: every
//! migration only creates what is missing.

use crate::error::Result;
use sqlx::{SqliteConnection, SqlitePool};

/// Ordered schema versions. A version is applied at most once.
const MIGRATIONS: &[(i32, &str)] = &[
    (1, include_str!("migrations/001_initial_schema.sql")),
    (2, include_str!("migrations/002_updated_at.sql")),
];

/// Ensure the schema exists; safe to call on every start.
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let applied: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?;

    let pending: Vec<_> = MIGRATIONS.iter().filter(|(v, _)| *v > applied).collect();
    if pending.is_empty() {
        tracing::debug!("Schema up to date at version {}", applied);
        return Ok(());
    }

    for (version, sql) in pending {
        let mut tx = pool.begin().await?;
        run_migration(&mut tx, *version, sql).await?;
        tx.commit().await?;
        tracing::info!("Schema migrated to version {}", version);
    }

    Ok(())
}

async fn run_migration(conn: &mut SqliteConnection, version: i32, sql: &str) -> Result<()> {
    let statements = sql.split(';').map(str::trim).filter(|s| !s.is_empty());
    for statement in statements {
        sqlx::query(statement).execute(&mut *conn).await?;
    }

    sqlx::query("INSERT INTO migrations (version) VALUES (?)")
        .bind(version)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
