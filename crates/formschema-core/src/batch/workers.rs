//! Worker pool for batch items.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{BatchJob, ItemOutcome};
use crate::catalog::FormInfo;

/// Shared receiver for multiple workers pulling from one unbounded channel.
pub(crate) struct SharedReceiver<T> {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
}

impl<T> SharedReceiver<T> {
    pub fn new_unbounded(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

/// A queued item and its position in the input.
pub(crate) type QueuedItem = (usize, FormInfo);

/// Spawn batch workers.
///
/// Each worker takes the next queued form, runs the job and sends the outcome
/// to the aggregator. Workers stop taking new items once `cancel` fires; items
/// already running finish on their own.
pub(crate) fn spawn_batch_workers<J: BatchJob>(
    count: usize,
    rx: SharedReceiver<QueuedItem>,
    job: Arc<J>,
    results: mpsc::UnboundedSender<ItemOutcome>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|i| {
            let rx = rx.clone();
            let job = job.clone();
            let results = results.clone();
            let cancel = cancel.clone();

            tokio::spawn(async move {
                tracing::debug!(worker = i, "Batch worker started");

                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        item = rx.recv() => item,
                    };
                    let Some((index, form)) = next else { break };

                    tracing::debug!(worker = i, form = %form.form_number, "Processing item");
                    let status = job.run(&form).await;

                    let outcome = ItemOutcome {
                        index,
                        form_number: form.form_number,
                        status,
                    };
                    if results.send(outcome).is_err() {
                        // Aggregator gone
                        break;
                    }
                }

                tracing::debug!(worker = i, "Batch worker stopped");
            })
        })
        .collect()
}
