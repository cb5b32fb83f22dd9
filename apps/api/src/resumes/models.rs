//! Resume records, uploads and the per-batch report.

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Column attached to every record; always the last key.
pub const FILE_NAME_FIELD: &str = "File Name";

pub const NAME_FIELD: &str = "Name";
pub const EMAIL_FIELD: &str = "Email";
pub const PHONE_FIELD: &str = "Phone";
pub const LOCATION_FIELD: &str = "Location";
pub const EXPERIENCE_FIELD: &str = "Years of Experience";

/// The five fields the model is asked for, in prompt order.
pub const TARGET_FIELDS: [&str; 5] = [
    NAME_FIELD,
    EMAIL_FIELD,
    PHONE_FIELD,
    LOCATION_FIELD,
    EXPERIENCE_FIELD,
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("a resume record needs a non-empty file name")]
    EmptyFileName,
}

/// One parsed resume. Fields are whatever the model returned, in the order it
/// returned them, followed by `File Name`. Values are not schema-checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResumeRecord {
    fields: Map<String, Value>,
}

impl ResumeRecord {
    /// Builds a record from decoded model output. A `File Name` key emitted by
    /// the model is replaced by the real upload name.
    pub fn new(file_name: &str, fields: Map<String, Value>) -> Result<Self, RecordError> {
        if file_name.trim().is_empty() {
            return Err(RecordError::EmptyFileName);
        }

        let mut fields: Map<String, Value> = fields
            .into_iter()
            .filter(|(key, _)| key != FILE_NAME_FIELD)
            .collect();
        fields.insert(
            FILE_NAME_FIELD.to_string(),
            Value::String(file_name.to_string()),
        );

        Ok(Self { fields })
    }

    pub fn file_name(&self) -> &str {
        self.fields
            .get(FILE_NAME_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn name(&self) -> Option<String> {
        self.text(NAME_FIELD)
    }

    pub fn email(&self) -> Option<String> {
        self.text(EMAIL_FIELD)
    }

    /// Target fields the model left out, returned as null or left blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        TARGET_FIELDS
            .into_iter()
            .filter(|field| self.text(field).map_or(true, |t| t.trim().is_empty()))
            .collect()
    }

    /// Best-effort text view: strings as-is, numbers and booleans printed, null as absent.
    fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Per-file notice surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    UnsupportedFileType { file_name: String, extension: String },
    ExtractionFailed { file_name: String, reason: String },
    Retrying { file_name: String, attempt: u32 },
    ParseFailed { file_name: String, attempts: u32, reason: String },
    ServiceUnavailable { file_name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl Diagnostic {
    pub fn file_name(&self) -> &str {
        match self {
            Diagnostic::UnsupportedFileType { file_name, .. }
            | Diagnostic::ExtractionFailed { file_name, .. }
            | Diagnostic::Retrying { file_name, .. }
            | Diagnostic::ParseFailed { file_name, .. }
            | Diagnostic::ServiceUnavailable { file_name, .. } => file_name,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::UnsupportedFileType { .. } | Diagnostic::Retrying { .. } => {
                Severity::Warning
            }
            Diagnostic::ExtractionFailed { .. }
            | Diagnostic::ParseFailed { .. }
            | Diagnostic::ServiceUnavailable { .. } => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Parsed,
    Skipped,
    Failed,
}

/// What happened to one upload. `attempts` counts LLM request/parse cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub file_name: String,
    pub status: FileStatus,
    pub attempts: u32,
}

/// Result of processing one batch, in upload order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub records: Vec<ResumeRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub outcomes: Vec<FileOutcome>,
    pub parsed_count: usize,
    pub total_files: usize,
}

impl BatchReport {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    pub fn outcome(&self, file_name: &str) -> Option<&FileOutcome> {
        self.outcomes.iter().find(|o| o.file_name == file_name)
    }
}
