//! Formschema Core - Government form retrieval and schema extraction
//!
//! This crate contains the core functionality for formschema, including:
//! - The built-in immigration form catalog and download URL rules
//! - Document transfer from public sources
//! - Extend API client (upload, edit run, status polling)
//! - The single-document schema pipeline
//! - Concurrent batch orchestration

pub mod batch;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod extend;
pub mod http;
pub mod pipeline;
pub mod schema;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use batch::{BatchOrchestrator, BatchOutcome, DownloadJob, ItemStatus, SchemaJob};
pub use catalog::{FormInfo, FormSource};
pub use config::{ApiKey, Config, Settings};
pub use error::{ConfigError, ExtendError, PipelineError, Stage, TransferError};
pub use events::{EventEmitter, NoOpEmitter, PipelineEvent};
pub use extend::{ExtendClient, PollPolicy};
pub use pipeline::{SchemaPipeline, SchemaReport, SchemaSource};
pub use schema::ExtractionResult;
