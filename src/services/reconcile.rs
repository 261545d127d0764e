//! Background reconciliation of the local interaction log.
//!
//! Copies the user's remotely stored history into an empty local log. Only
//! ever appends: rows already present keep their feed position, and nothing
//! is deleted. Safe to run while the local cache source is paging remote
//! shards.

use crate::Result;
use crate::models::ContentId;
use crate::storage::{InteractionLog, RemoteHistory};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::instrument;

/// Upper bound on history pages per run; a misbehaving remote cannot spin
/// forever.
const MAX_HISTORY_PAGES: usize = 1_000;

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// History pages read.
    pub pages: usize,
    /// Rows seen in the remote history.
    pub seen: usize,
    /// Rows newly appended locally.
    pub appended: usize,
}

/// Pulls remote history into the local log.
pub struct Reconciler {
    history: Arc<dyn RemoteHistory>,
    log: Arc<dyn InteractionLog>,
    running: AtomicBool,
}

impl Reconciler {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(history: Arc<dyn RemoteHistory>, log: Arc<dyn InteractionLog>) -> Self {
        Self {
            history,
            log,
            running: AtomicBool::new(false),
        }
    }

    /// Returns true while a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs one reconciliation pass.
    ///
    /// Returns `None` if another pass is already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote history or the local log fails. Rows
    /// appended before the failure stay in place.
    #[instrument(skip(self), fields(operation = "reconcile"))]
    pub async fn run(&self) -> Result<Option<ReconcileReport>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Reconciliation already running");
            return Ok(None);
        }
        let start = Instant::now();
        let result = self.pull().await;
        self.running.store(false, Ordering::SeqCst);

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("feed_reconciliations_total", "status" => status).increment(1);
        metrics::histogram!("feed_reconciliation_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        result.map(Some)
    }

    async fn pull(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut cursor: Option<String> = None;

        while report.pages < MAX_HISTORY_PAGES {
            let page = self.history.history_page(cursor.as_deref()).await?;
            report.pages += 1;

            let ids: Vec<ContentId> = page
                .interactions
                .iter()
                .map(|row| row.content.id.clone())
                .collect();
            let known: HashSet<ContentId> = self
                .log
                .get_by_ids(&ids)?
                .into_iter()
                .map(|row| row.content_id)
                .collect();

            for row in page.interactions {
                report.seen += 1;
                if !known.contains(&row.content.id) {
                    report.appended += 1;
                }
                self.log.append(row)?;
            }

            if !page.has_more || page.next_cursor.is_none() || page.next_cursor == cursor {
                break;
            }
            cursor = page.next_cursor;
        }

        tracing::info!(
            pages = report.pages,
            seen = report.seen,
            appended = report.appended,
            "Reconciled interaction log"
        );
        Ok(report)
    }

    /// Starts a pass on the tokio runtime without waiting for it.
    pub fn spawn(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.run().await {
                tracing::warn!(error = %e, "Background reconciliation failed");
            }
        });
    }
}
