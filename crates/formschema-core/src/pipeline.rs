//! Single-document schema pipeline.
//!
//! ```text
//! resolve ──► transfer ──► upload ──► start job ──► poll ──► persist
//! (path/form)  (forms only)  FileId      RunId       schema    JSON file
//! ```
//!
//! Stages run strictly in order and the first failure stops the run. The
//! error names the stage so callers can tell remote failures from local ones.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::catalog::{urls, ArtifactKind, FormInfo, SourceEndpoints};
use crate::config::{ApiKey, Settings};
use crate::error::{ConfigError, PipelineError, Stage};
use crate::events::{EventEmitter, NoOpEmitter, PipelineEvent};
use crate::extend::{wait_for_completion, ExtendClient, ExtractionService, JobHandle, PollPolicy};
use crate::http::build_client;
use crate::schema::{default_output_path, ExtractionResult};
use crate::transfer::{DocumentFetcher, HttpFetcher};

/// What to extract a schema from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// A local PDF. The default output goes next to it.
    File(PathBuf),
    /// Bytes already in memory, named for upload and output.
    Bytes { bytes: Bytes, file_name: String },
    /// A catalog form, downloaded first.
    Form(FormInfo),
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct SchemaReport {
    /// File name the document was uploaded as
    pub source_name: String,
    pub source_bytes: usize,
    pub handle: JobHandle,
    pub result: ExtractionResult,
    pub output_path: PathBuf,
}

impl SchemaReport {
    pub fn field_count(&self) -> usize {
        self.result.field_count()
    }
}

/// Document resolved to bytes, ready for upload
struct Resolved {
    bytes: Bytes,
    name: String,
    default_dir: PathBuf,
}

/// Fetch-then-extract coordinator.
pub struct SchemaPipeline {
    service: Arc<dyn ExtractionService>,
    fetcher: Arc<dyn DocumentFetcher>,
    endpoints: SourceEndpoints,
    poll: PollPolicy,
    output_dir: PathBuf,
    emitter: Arc<dyn EventEmitter>,
    cancel: CancellationToken,
}

impl SchemaPipeline {
    pub fn new(
        service: Arc<dyn ExtractionService>,
        fetcher: Arc<dyn DocumentFetcher>,
        endpoints: SourceEndpoints,
        poll: PollPolicy,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            service,
            fetcher,
            endpoints,
            poll,
            output_dir: output_dir.into(),
            emitter: Arc::new(NoOpEmitter),
            cancel: CancellationToken::new(),
        }
    }

    /// Build the HTTP-backed pipeline, resolving the credential from `api_key`
    /// or the environment.
    pub fn from_settings(
        settings: &Settings,
        api_key: Option<&str>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        Self::from_settings_with(settings, api_key, |name| std::env::var(name).ok(), output_dir)
    }

    /// Same as [`SchemaPipeline::from_settings`] with a custom environment lookup.
    ///
    /// The credential is checked before anything else is built, so a missing
    /// key never reaches the network.
    pub fn from_settings_with<F>(
        settings: &Settings,
        api_key: Option<&str>,
        lookup: F,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let api_key = ApiKey::resolve_with(api_key, lookup)?;
        settings.validate()?;

        let client = build_client(settings)?;
        let service = ExtendClient::new(client.clone(), settings, &api_key)?;
        let fetcher = HttpFetcher::new(client);

        Ok(Self::new(
            Arc::new(service),
            Arc::new(fetcher),
            settings.sources.clone(),
            settings.poll_policy(),
            output_dir,
        ))
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run every stage for `source`, writing the schema to `output` or to the
    /// derived default path.
    pub async fn run(
        &self,
        source: SchemaSource,
        output: Option<PathBuf>,
    ) -> Result<SchemaReport, PipelineError> {
        let resolved = self.resolve(source).await?;
        let output_path =
            output.unwrap_or_else(|| default_output_path(&resolved.default_dir, &resolved.name));

        self.extract(resolved.bytes, &resolved.name, output_path).await
    }

    /// Upload, extract and persist bytes that are already in memory.
    pub async fn extract(
        &self,
        bytes: Bytes,
        source_name: &str,
        output_path: PathBuf,
    ) -> Result<SchemaReport, PipelineError> {
        let source_bytes = bytes.len();

        self.ensure_active()?;
        tracing::info!(source = source_name, bytes = source_bytes, "Uploading to Extend API");
        let file_id = self
            .service
            .submit(bytes, source_name)
            .await
            .map_err(|e| PipelineError::extend(Stage::Upload, e))?;
        self.emitter.emit(PipelineEvent::Uploaded {
            source: source_name.to_string(),
            file_id: file_id.to_string(),
        });

        self.ensure_active()?;
        let run_id = self
            .service
            .start_job(&file_id)
            .await
            .map_err(|e| PipelineError::extend(Stage::JobStart, e))?;
        tracing::info!(source = source_name, file_id = %file_id, run_id = %run_id, "Schema extraction started");
        self.emitter.emit(PipelineEvent::JobStarted {
            source: source_name.to_string(),
            run_id: run_id.to_string(),
        });

        let result = wait_for_completion(
            self.service.as_ref(),
            &run_id,
            &self.poll,
            &self.cancel,
            self.emitter.as_ref(),
        )
        .await
        .map_err(|e| PipelineError::extend(Stage::Extraction, e))?;

        result
            .save(&output_path)
            .await
            .map_err(|source| PipelineError::Persist {
                path: output_path.clone(),
                source,
            })?;

        let field_count = result.field_count();
        tracing::info!(
            source = source_name,
            path = %output_path.display(),
            field_count,
            "Schema saved"
        );
        self.emitter.emit(PipelineEvent::SchemaSaved {
            source: source_name.to_string(),
            path: output_path.clone(),
            field_count,
        });

        Ok(SchemaReport {
            source_name: source_name.to_string(),
            source_bytes,
            handle: JobHandle { file_id, run_id },
            result,
            output_path,
        })
    }

    async fn resolve(&self, source: SchemaSource) -> Result<Resolved, PipelineError> {
        match source {
            SchemaSource::File(path) => {
                if !path.is_file() {
                    return Err(ConfigError::InputNotFound(path).into());
                }
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|source| PipelineError::Read {
                        path: path.clone(),
                        source,
                    })?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "document.pdf".to_string());
                let default_dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));

                Ok(Resolved {
                    bytes: Bytes::from(bytes),
                    name,
                    default_dir,
                })
            }
            SchemaSource::Bytes { bytes, file_name } => Ok(Resolved {
                bytes,
                name: file_name,
                default_dir: self.output_dir.clone(),
            }),
            SchemaSource::Form(form) => {
                let request = urls::form_request(&form, &self.endpoints)?;
                self.ensure_active()?;

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
                        return Err(PipelineError::Transfer(e));
                    }
                };
                self.emitter.emit(PipelineEvent::TransferCompleted {
                    form: form.form_number.clone(),
                    kind: ArtifactKind::Form,
                    bytes: bytes.len(),
                    path: None,
                });

                Ok(Resolved {
                    bytes,
                    name: request.file_name,
                    default_dir: self.output_dir.clone(),
                })
            }
        }
    }

    fn ensure_active(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
