//! Batch orchestration over catalog forms.
//!
//! A fixed pool of workers pulls forms from a shared queue and runs the same
//! [`BatchJob`] on each. A single aggregator collects the outcomes, so counters
//! never race and one item's failure never stops the others.

mod jobs;
mod workers;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::catalog::FormInfo;
use crate::error::Stage;
use crate::events::{EventEmitter, NoOpEmitter, PipelineEvent};
use workers::{spawn_batch_workers, SharedReceiver};

pub use jobs::{DownloadJob, SchemaJob};

/// Default number of items processed at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Work applied to each form of a batch.
///
/// Implementations report every failure through [`ItemStatus::Failed`]; a job
/// never aborts the batch.
#[async_trait]
pub trait BatchJob: Send + Sync + 'static {
    async fn run(&self, form: &FormInfo) -> ItemStatus;
}

/// What happened to a form's instructions document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InstructionsOutcome {
    NotRequested,
    /// The source does not publish separate instructions
    NotPublished,
    Saved { bytes: usize, path: PathBuf },
    /// Fetch or save failed. The form itself still counts as succeeded.
    Unavailable { reason: String },
}

/// Final state of one batch item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Succeeded {
        /// Size of the primary document
        bytes: usize,
        /// Saved form PDF or schema file
        path: PathBuf,
        instructions: InstructionsOutcome,
        field_count: Option<usize>,
    },
    Failed { stage: Stage, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    /// Position in the requested list
    pub index: usize,
    pub form_number: String,
    #[serde(flatten)]
    pub status: ItemStatus,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ItemStatus::Succeeded { .. })
    }
}

/// Summary of a whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Outcomes in request order
    pub items: Vec<ItemOutcome>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Cancellation stopped the batch before every item ran
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchOutcome {
    fn begin(total: usize) -> Self {
        let now = Utc::now();
        Self {
            items: Vec::with_capacity(total),
            total,
            succeeded: 0,
            failed: 0,
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    fn record(&mut self, item: ItemOutcome) {
        if item.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.items.push(item);
    }

    fn finish(mut self, cancelled: bool) -> Self {
        self.items.sort_by_key(|item| item.index);
        self.cancelled = cancelled;
        self.finished_at = Utc::now();
        self
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Items never started because the batch was cancelled
    pub fn skipped(&self) -> usize {
        self.total.saturating_sub(self.processed())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(|item| !item.is_success())
    }

    /// Every requested item ran and succeeded.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped() == 0
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Runs a [`BatchJob`] over many forms with bounded concurrency.
pub struct BatchOrchestrator {
    concurrency: usize,
    emitter: Arc<dyn EventEmitter>,
    cancel: CancellationToken,
}

impl Default for BatchOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl BatchOrchestrator {
    /// `concurrency` is clamped to at least one worker.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            emitter: Arc::new(NoOpEmitter),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process every form and return once all started items have finished.
    pub async fn run<J: BatchJob>(&self, forms: Vec<FormInfo>, job: Arc<J>) -> BatchOutcome {
        let total = forms.len();
        let mut outcome = BatchOutcome::begin(total);
        if total == 0 {
            return outcome.finish(false);
        }

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        for item in forms.into_iter().enumerate() {
            let _ = queue_tx.send(item);
        }
        drop(queue_tx);

        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        let workers = self.concurrency.min(total);
        tracing::info!(total, workers, "Starting batch");

        let handles = spawn_batch_workers(
            workers,
            SharedReceiver::new_unbounded(queue_rx),
            job,
            result_tx,
            self.cancel.clone(),
        );

        while let Some(item) = result_rx.recv().await {
            let succeeded = item.is_success();
            let form = item.form_number.clone();

            if let ItemStatus::Failed { stage, error } = &item.status {
                tracing::warn!(form = %form, stage = %stage, error = %error, "Batch item failed");
            }
            outcome.record(item);

            self.emitter.emit(PipelineEvent::ItemFinished {
                form,
                succeeded,
                processed: outcome.processed(),
                total,
            });
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Batch worker panicked");
            }
        }

        // Jobs share the token, so a late cancel may cut a running item short
        // without leaving anything unstarted.
        let cancelled = self.cancel.is_cancelled();
        let outcome = outcome.finish(cancelled);
        tracing::info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            skipped = outcome.skipped(),
            "Batch finished"
        );
        outcome
    }
}
