//! Extracted field schema and its on-disk form.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// Suffix appended to the source name for the default output file.
pub const SCHEMA_SUFFIX: &str = "_Extend_Schema.json";

/// The `outputSchema` of a completed edit run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    schema: Map<String, Value>,
}

impl ExtractionResult {
    pub fn new(schema: Map<String, Value>) -> Self {
        Self { schema }
    }

    /// Accept an `outputSchema` value. Only JSON objects are schemas.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(schema) => Some(Self { schema }),
            _ => None,
        }
    }

    pub fn schema(&self) -> &Map<String, Value> {
        &self.schema
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.schema)
    }

    /// Number of discovered fields.
    ///
    /// Object schemas (`"type": "object"` with a `properties` map) list their
    /// fields under `properties`. Anything else is a flat payload counted by
    /// its top-level entries, even when one of its fields is named
    /// `properties`.
    pub fn field_count(&self) -> usize {
        let is_object_schema = self.schema.get("type").and_then(Value::as_str) == Some("object");
        match self.schema.get("properties") {
            Some(Value::Object(properties)) if is_object_schema => properties.len(),
            _ => self.schema.len(),
        }
    }

    /// Pretty-printed JSON, exactly as written to disk.
    pub fn to_pretty_json(&self) -> String {
        // Serializing a Map<String, Value> cannot fail
        serde_json::to_string_pretty(&self.schema).unwrap_or_default()
    }

    /// Write the schema to `path`, creating parent directories.
    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_pretty_json()).await
    }

    /// Read a previously saved schema.
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Self::from_value(value).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "schema file does not contain a JSON object",
            )
        })
    }
}

/// `<dir>/<stem>_Extend_Schema.json`
pub fn default_output_path(dir: &Path, source_name: &str) -> PathBuf {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source_name.to_string());
    dir.join(format!("{}{}", stem, SCHEMA_SUFFIX))
}
