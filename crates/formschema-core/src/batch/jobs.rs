//! Batch jobs: download catalog PDFs, or extract schemas for them.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{BatchJob, InstructionsOutcome, ItemStatus};
use crate::catalog::{urls, ArtifactKind, FormInfo, SourceEndpoints};
use crate::error::Stage;
use crate::events::{EventEmitter, NoOpEmitter, PipelineEvent};
use crate::pipeline::{SchemaPipeline, SchemaSource};
use crate::transfer::{self, DocumentFetcher};

/// Saves `<FORM>.pdf` (and optionally `<FORM>_instructions.pdf`) into a
/// directory.
pub struct DownloadJob {
    fetcher: Arc<dyn DocumentFetcher>,
    endpoints: SourceEndpoints,
    output_dir: PathBuf,
    instructions: bool,
    emitter: Arc<dyn EventEmitter>,
    cancel: CancellationToken,
}

impl DownloadJob {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        endpoints: SourceEndpoints,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            endpoints,
            output_dir: output_dir.into(),
            instructions: false,
            emitter: Arc::new(NoOpEmitter),
            cancel: CancellationToken::new(),
        }
    }

    /// Also fetch instructions where the source publishes them.
    pub fn with_instructions(mut self, instructions: bool) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Checked before each request; a cancelled job makes no further calls.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn fetch_instructions(&self, form: &FormInfo) -> InstructionsOutcome {
        let Some(request) = urls::instructions_request(form, &self.endpoints) else {
            return InstructionsOutcome::NotPublished;
        };
        if self.cancel.is_cancelled() {
            tracing::debug!(form = %form.form_number, "Skipping instructions after cancel");
            return InstructionsOutcome::Unavailable {
                reason: "cancelled".to_string(),
            };
        }

        self.emitter.emit(PipelineEvent::TransferStarted {
            form: form.form_number.clone(),
            kind: ArtifactKind::Instructions,
            url: request.url.clone(),
        });

        let stored = match self.fetcher.fetch(&request.url).await {
            Ok(bytes) => transfer::store(&self.output_dir, &request.file_name, &bytes)
                .await
                .map(|path| (bytes.len(), path))
                .map_err(|e| format!("failed to save: {}", e)),
            Err(e) => Err(e.to_string()),
        };

        match stored {
            Ok((bytes, path)) => {
                self.emitter.emit(PipelineEvent::TransferCompleted {
                    form: form.form_number.clone(),
                    kind: ArtifactKind::Instructions,
                    bytes,
                    path: Some(path.clone()),
                });
                InstructionsOutcome::Saved { bytes, path }
            }
            Err(reason) => {
                tracing::warn!(form = %form.form_number, reason = %reason, "Instructions unavailable");
                self.emitter.emit(PipelineEvent::InstructionsUnavailable {
                    form: form.form_number.clone(),
                    reason: reason.clone(),
                });
                InstructionsOutcome::Unavailable { reason }
            }
        }
    }
}

#[async_trait]
impl BatchJob for DownloadJob {
    async fn run(&self, form: &FormInfo) -> ItemStatus {
        let request = match urls::form_request(form, &self.endpoints) {
            Ok(request) => request,
            Err(e) => {
                return ItemStatus::Failed {
                    stage: Stage::Resolve,
                    error: e.to_string(),
                }
            }
        };

        if self.cancel.is_cancelled() {
            return ItemStatus::Failed {
                stage: Stage::Cancelled,
                error: "cancelled".to_string(),
            };
        }

        self.emitter.emit(PipelineEvent::TransferStarted {
            form: form.form_number.clone(),
            kind: ArtifactKind::Form,
            url: request.url.clone(),
        });

        let bytes = match self.fetcher.fetch(&request.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.emitter.emit(PipelineEvent::TransferFailed {
                    form: form.form_number.clone(),
                    error: e.to_string(),
                });
                return ItemStatus::Failed {
                    stage: Stage::Transfer,
                    error: e.to_string(),
                };
            }
        };

        let path = match transfer::store(&self.output_dir, &request.file_name, &bytes).await {
            Ok(path) => path,
            Err(e) => {
                return ItemStatus::Failed {
                    stage: Stage::Persist,
                    error: format!("failed to save {}: {}", request.file_name, e),
                }
            }
        };

        tracing::info!(form = %form.form_number, bytes = bytes.len(), path = %path.display(), "Form downloaded");
        self.emitter.emit(PipelineEvent::TransferCompleted {
            form: form.form_number.clone(),
            kind: ArtifactKind::Form,
            bytes: bytes.len(),
            path: Some(path.clone()),
        });

        let instructions = if self.instructions {
            self.fetch_instructions(form).await
        } else {
            InstructionsOutcome::NotRequested
        };

        ItemStatus::Succeeded {
            bytes: bytes.len(),
            path,
            instructions,
            field_count: None,
        }
    }
}

/// Runs the full schema pipeline for each form.
pub struct SchemaJob {
    pipeline: Arc<SchemaPipeline>,
}

impl SchemaJob {
    pub fn new(pipeline: Arc<SchemaPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl BatchJob for SchemaJob {
    async fn run(&self, form: &FormInfo) -> ItemStatus {
        match self.pipeline.run(SchemaSource::Form(form.clone()), None).await {
            Ok(report) => ItemStatus::Succeeded {
                bytes: report.source_bytes,
                field_count: Some(report.field_count()),
                path: report.output_path,
                instructions: InstructionsOutcome::NotRequested,
            },
            Err(e) => ItemStatus::Failed {
                stage: e.stage(),
                error: e.to_string(),
            },
        }
    }
}
