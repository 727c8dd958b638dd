//! Progress events for presentation layers.
//!
//! The core never prints. Components report through an [`EventEmitter`] and
//! the caller decides how (or whether) to render them.

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::catalog::ArtifactKind;

/// Something observable happened in a transfer, job or batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A document fetch is about to start
    TransferStarted {
        form: String,
        kind: ArtifactKind,
        url: String,
    },
    /// A document fetch finished and was stored
    TransferCompleted {
        form: String,
        kind: ArtifactKind,
        bytes: usize,
        path: Option<PathBuf>,
    },
    /// The primary document fetch failed
    TransferFailed { form: String, error: String },
    /// Best-effort instructions fetch failed; the item is unaffected
    InstructionsUnavailable { form: String, reason: String },
    /// Document uploaded to the Extend API
    Uploaded { source: String, file_id: String },
    /// Edit run created
    JobStarted { source: String, run_id: String },
    /// One status check answered
    StatusChecked {
        run_id: String,
        attempt: u32,
        status: String,
    },
    /// Schema written to disk
    SchemaSaved {
        source: String,
        path: PathBuf,
        field_count: usize,
    },
    /// One batch item reached its final outcome
    ItemFinished {
        form: String,
        succeeded: bool,
        processed: usize,
        total: usize,
    },
}

/// Receives pipeline events.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// No-op implementation for callers that do not render progress
pub struct NoOpEmitter;

impl EventEmitter for NoOpEmitter {
    fn emit(&self, _event: PipelineEvent) {}
}

/// Forwards events into a bounded channel. Events are dropped rather than
/// blocking the pipeline when the receiver falls behind.
#[derive(Clone)]
pub struct ChannelEmitter {
    tx: mpsc::Sender<PipelineEvent>,
}

impl ChannelEmitter {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PipelineEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.try_send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_emitter_forwards() {
        let (emitter, mut rx) = ChannelEmitter::new(4);
        emitter.emit(PipelineEvent::JobStarted {
            source: "I-130.pdf".to_string(),
            run_id: "run_1".to_string(),
        });

        match rx.recv().await.unwrap() {
            PipelineEvent::JobStarted { run_id, .. } => assert_eq!(run_id, "run_1"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_channel_emitter_drops_when_full() {
        let (emitter, mut rx) = ChannelEmitter::new(1);
        for attempt in 1..=3 {
            emitter.emit(PipelineEvent::StatusChecked {
                run_id: "run_1".to_string(),
                attempt,
                status: "running".to_string(),
            });
        }

        assert!(matches!(
            rx.recv().await,
            Some(PipelineEvent::StatusChecked { attempt: 1, .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::ItemFinished {
            form: "I-90".to_string(),
            succeeded: true,
            processed: 1,
            total: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "item_finished");
        assert_eq!(json["form"], "I-90");
    }
}
