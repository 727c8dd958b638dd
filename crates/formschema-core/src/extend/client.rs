//! Extend API client
//!
//! Uses reqwest for the upload, edit-run and status endpoints. Every request
//! carries the bearer credential and the pinned API version header.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::Deserialize;

use super::{ExtractionService, FileId, JobStatus, RunId, RunSnapshot};
use crate::config::{ApiKey, Settings};
use crate::error::{ConfigError, ExtendError};

const API_VERSION_HEADER: &str = "x-extend-api-version";

/// Extend API client over the shared HTTP pool
#[derive(Clone)]
pub struct ExtendClient {
    client: reqwest::Client,
    api_base: String,
    headers: HeaderMap,
}

impl ExtendClient {
    /// Create a client. Fails only if the key or version cannot be sent as a header.
    pub fn new(
        client: reqwest::Client,
        settings: &Settings,
        api_key: &ApiKey,
    ) -> Result<Self, ConfigError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose())).map_err(
            |_| ConfigError::InvalidSetting {
                name: "api_key",
                reason: "contains characters not allowed in an HTTP header".to_string(),
            },
        )?;
        auth.set_sensitive(true);

        let version =
            HeaderValue::from_str(&settings.api_version).map_err(|_| ConfigError::InvalidSetting {
                name: "api_version",
                reason: "contains characters not allowed in an HTTP header".to_string(),
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(API_VERSION_HEADER, version);

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            headers,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }
}

#[async_trait]
impl ExtractionService for ExtendClient {
    async fn submit(&self, bytes: Bytes, file_name: &str) -> Result<FileId, ExtendError> {
        let size = bytes.len();
        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("files"))
            .headers(self.headers.clone())
            .multipart(form)
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(ExtendError::Upload {
                status: status.as_u16(),
                body,
            });
        }

        let id = parse_id(&body, "file")?;
        tracing::debug!(file_id = %id, file_name, size, "Uploaded document");
        Ok(FileId::new(id))
    }

    async fn start_job(&self, file_id: &FileId) -> Result<RunId, ExtendError> {
        let response = self
            .client
            .post(self.url(&format!("files/{}/edit-runs", file_id)))
            .headers(self.headers.clone())
            .json(&serde_json::json!({ "config": {} }))
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(ExtendError::JobStart {
                status: status.as_u16(),
                body,
            });
        }

        let id = parse_id(&body, "run")?;
        tracing::debug!(file_id = %file_id, run_id = %id, "Started edit run");
        Ok(RunId::new(id))
    }

    async fn poll_once(&self, run_id: &RunId) -> Result<RunSnapshot, ExtendError> {
        let response = self
            .client
            .get(self.url(&format!("edit-runs/{}", run_id)))
            .headers(self.headers.clone())
            .send()
            .await?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(ExtendError::Poll {
                status: status.as_u16(),
                body,
            });
        }

        let run: EditRunResponse = serde_json::from_str(&body)
            .map_err(|e| ExtendError::InvalidResponse(format!("edit run status: {}", e)))?;

        Ok(RunSnapshot {
            status: JobStatus::parse(run.status.as_deref()),
            output_schema: run.output_schema,
        })
    }
}

async fn read_body(response: Response) -> Result<(StatusCode, String), ExtendError> {
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

fn parse_id(body: &str, what: &str) -> Result<String, ExtendError> {
    let parsed: IdResponse = serde_json::from_str(body)
        .map_err(|e| ExtendError::InvalidResponse(format!("{} response: {}", what, e)))?;

    parsed
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ExtendError::InvalidResponse(format!("no {} ID in response", what)))
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditRunResponse {
    status: Option<String>,
    #[serde(rename = "outputSchema")]
    output_schema: Option<serde_json::Value>,
}
