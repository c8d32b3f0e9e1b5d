//! Outbox processor
//!
//! Drains the sync queue towards a remote system. Each run checks
//! connectivity, then delivers unprocessed entries oldest first. A delivered
//! entry is acknowledged and its record marked synced in one transaction,
//! unless newer changes to that record are still queued.

use crate::config::{CONNECTIVITY_PROBE_TIMEOUT, MIN_SYNC_INTERVAL_SECS};
use crate::database::outbox;
use crate::database::{Repository, SyncOutbox, SyncQueueEntry};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Answers whether a remote system is currently reachable
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probes connectivity with an HTTP `HEAD` request
pub struct HttpProbe {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpProbe {
    pub fn new(url: &str) -> Result<Self> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| AppError::Validation(format!("invalid probe URL {}: {}", url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(CONNECTIVITY_PROBE_TIMEOUT)
            .build()?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_online(&self) -> bool {
        match self.client.head(self.url.clone()).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Connectivity probe to {} failed: {}", self.url, e);
                false
            }
        }
    }
}

/// Probe that never reports offline
pub struct AlwaysOnline;

#[async_trait]
impl ConnectivityProbe for AlwaysOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// Destination of queued mutations
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Deliver one entry. An error leaves the entry queued for the next run.
    async fn deliver(&self, entry: &SyncQueueEntry, payload: &serde_json::Value) -> Result<()>;
}

/// Accepts every entry and logs it
pub struct SimulatedRemote;

#[async_trait]
impl RemoteSink for SimulatedRemote {
    async fn deliver(&self, entry: &SyncQueueEntry, payload: &serde_json::Value) -> Result<()> {
        tracing::info!(
            "Syncing {} on {} #{:?}: {}",
            entry.action,
            entry.table_name,
            entry.record_id,
            payload
        );
        Ok(())
    }
}

/// Outcome of one outbox drain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub skipped_offline: bool,
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Service draining the sync queue
#[derive(Clone)]
pub struct SyncService {
    repo: Repository,
    outbox: SyncOutbox,
    probe: Arc<dyn ConnectivityProbe>,
    remote: Arc<dyn RemoteSink>,
}

impl SyncService {
    pub fn new(
        repo: Repository,
        outbox: SyncOutbox,
        probe: Arc<dyn ConnectivityProbe>,
        remote: Arc<dyn RemoteSink>,
    ) -> Self {
        Self {
            repo,
            outbox,
            probe,
            remote,
        }
    }

    /// Start the background processor. The first run happens immediately.
    /// Periods shorter than the configured minimum are raised to it.
    pub fn start(self, period: Duration) -> JoinHandle<()> {
        let period = period.max(Duration::from_secs(MIN_SYNC_INTERVAL_SECS));

        tokio::spawn(async move {
            tracing::info!("Starting outbox processor (every {:?})", period);

            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                if let Err(e) = self.process_once().await {
                    tracing::error!("Error processing sync queue: {}", e);
                }
            }
        })
    }

    /// Drain the queue once
    pub async fn process_once(&self) -> Result<SyncReport> {
        if !self.probe.is_online().await {
            tracing::info!("Offline, sync postponed");
            return Ok(SyncReport {
                skipped_offline: true,
                ..Default::default()
            });
        }

        let entries = self.outbox.pull_unprocessed().await?;
        let mut report = SyncReport {
            attempted: entries.len(),
            ..Default::default()
        };

        for entry in &entries {
            match self.process_entry(entry).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::error!("Failed to sync entry {}: {}", entry.id, e);
                    report.failed += 1;
                }
            }
        }

        if report.attempted > 0 {
            tracing::info!(
                "Sync run finished: {} delivered, {} failed",
                report.delivered,
                report.failed
            );
        }

        Ok(report)
    }

    async fn process_entry(&self, entry: &SyncQueueEntry) -> Result<()> {
        let payload = entry.payload()?;

        self.remote.deliver(entry, &payload).await?;

        let mut tx = self.repo.begin().await?;
        if !outbox::acknowledge(&mut tx, entry.id).await? {
            return Err(AppError::Sync(format!("entry {} vanished", entry.id)));
        }
        if let (Some(table), Some(record_id)) = (entry.table(), entry.record_id) {
            Repository::mark_synced_if_settled(&mut tx, table, record_id).await?;
        }
        tx.commit().await?;

        Ok(())
    }
}
