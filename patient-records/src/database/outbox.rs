//! Sync outbox
//!
//! Append-only log of local mutations awaiting delivery to a remote system.
//! Entries written by record mutations go through [`append`] on the
//! mutation's own transaction, so the log and the data commit together.

use super::models::{SyncAction, SyncQueueEntry, SyncTable};
use crate::error::Result;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

/// Append one entry on the caller's connection (normally an open transaction).
pub async fn append(
    conn: &mut SqliteConnection,
    table: &str,
    record_id: i64,
    action: SyncAction,
    data: &serde_json::Value,
) -> Result<i64> {
    let payload = serde_json::to_string(data)?;

    let id = sqlx::query(
        r#"
        INSERT INTO sync_queue (table_name, record_id, action, data, created_at, is_processed)
        VALUES (?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(table)
    .bind(record_id)
    .bind(action)
    .bind(&payload)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    tracing::debug!(
        "Queued {} of {} #{} (entry {})",
        action,
        table,
        record_id,
        id
    );
    Ok(id)
}

/// Flag an entry as delivered on the caller's connection.
/// Returns false if the id is unknown.
pub async fn acknowledge(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let rows = sqlx::query("UPDATE sync_queue SET is_processed = 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    tracing::debug!("Marked sync entry {} as processed", id);
    Ok(rows > 0)
}

/// Read and acknowledge side of the sync queue
#[derive(Clone)]
pub struct SyncOutbox {
    pool: SqlitePool,
}

impl SyncOutbox {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an entry outside of any record mutation
    pub async fn append(
        &self,
        table: &str,
        record_id: i64,
        action: SyncAction,
        data: &serde_json::Value,
    ) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        append(&mut conn, table, record_id, action, data).await
    }

    /// Unprocessed entries, oldest first
    pub async fn pull_unprocessed(&self) -> Result<Vec<SyncQueueEntry>> {
        let entries = sqlx::query_as::<_, SyncQueueEntry>(
            r#"
            SELECT * FROM sync_queue
            WHERE is_processed = 0
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Flag an entry as delivered. Returns false if the id is unknown.
    pub async fn mark_processed(&self, id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        acknowledge(&mut conn, id).await
    }

    pub async fn count_unprocessed(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE is_processed = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Full audit trail of one record, oldest first
    pub async fn entries_for(&self, table: SyncTable, record_id: i64) -> Result<Vec<SyncQueueEntry>> {
        let entries = sqlx::query_as::<_, SyncQueueEntry>(
            r#"
            SELECT * FROM sync_queue
            WHERE table_name = ? AND record_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(table.as_str())
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_memory_pool;
    use serde_json::json;

    async fn create_test_outbox() -> SyncOutbox {
        SyncOutbox::new(create_memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_append_and_pull_oldest_first() {
        let outbox = create_test_outbox().await;

        let first = outbox
            .append("patients", 1, SyncAction::Insert, &json!({"id": 1}))
            .await
            .unwrap();
        let second = outbox
            .append("patients", 1, SyncAction::Update, &json!({"id": 1, "age": 30}))
            .await
            .unwrap();

        let pending = outbox.pull_unprocessed().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first);
        assert_eq!(pending[0].action, SyncAction::Insert);
        assert_eq!(pending[1].id, second);
        assert_eq!(pending[1].payload().unwrap()["age"], 30);
        assert!(!pending[0].is_processed);
    }

    #[tokio::test]
    async fn test_mark_processed_is_idempotent_and_restartable() {
        let outbox = create_test_outbox().await;

        let a = outbox
            .append("doctors", 4, SyncAction::Insert, &json!({"id": 4}))
            .await
            .unwrap();
        let b = outbox
            .append("doctors", 4, SyncAction::Delete, &json!({"id": 4}))
            .await
            .unwrap();

        assert!(outbox.mark_processed(a).await.unwrap());
        assert!(outbox.mark_processed(a).await.unwrap());
        assert!(!outbox.mark_processed(9999).await.unwrap());

        let remaining = outbox.pull_unprocessed().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b);
        assert_eq!(outbox.count_unprocessed().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_append_rolls_back_with_transaction() {
        let pool = create_memory_pool().await.unwrap();
        let outbox = SyncOutbox::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        append(&mut tx, "patients", 7, SyncAction::Insert, &json!({"id": 7}))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(outbox.count_unprocessed().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_entries_for_record() {
        let outbox = create_test_outbox().await;

        outbox
            .append("patients", 1, SyncAction::Insert, &json!({"id": 1}))
            .await
            .unwrap();
        outbox
            .append("patients", 2, SyncAction::Insert, &json!({"id": 2}))
            .await
            .unwrap();
        outbox
            .append("doctors", 1, SyncAction::Insert, &json!({"id": 1}))
            .await
            .unwrap();

        let trail = outbox.entries_for(SyncTable::Patients, 1).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].table(), Some(SyncTable::Patients));
    }
}
