//! Resume pipeline: extract → prompt → LLM → repair, with a bounded parse retry.
//!
//! Files are processed strictly one at a time in upload order. Every failure is
//! file-scoped: the batch always runs to the end.
//!
//! Two retry classes are kept apart:
//! - transport failures (429 / 5xx / connection) are retried inside `LlmClient`;
//!   if they persist the file is reported as `ServiceUnavailable` straight away.
//! - replies without usable JSON are retried here, up to `RetryPolicy::max_retries`
//!   additional full request/parse cycles with a fixed delay in between.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::extraction::{ExtractError, TextExtractor};
use crate::llm_client::{collect_stream, ChatCompletion, LlmError, Prompt};
use crate::resumes::models::{
    BatchReport, Diagnostic, FileOutcome, FileStatus, RecordError, ResumeRecord, Upload,
};
use crate::resumes::prompts::build_prompt;
use crate::resumes::repair::{repair_json, RepairError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional cycles after the first; total cycles = 1 + max_retries.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.parse_max_retries,
            delay: config.parse_retry_delay(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Why a single file did not produce a record.
#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("LLM service unavailable on attempt {attempt}: {source}")]
    ServiceUnavailable { attempt: u32, source: LlmError },

    #[error("Failed to parse JSON after {attempts} attempts: {last}")]
    ParseExhausted { attempts: u32, last: RepairError },

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// A successfully parsed resume and the number of cycles it took.
#[derive(Debug, Clone)]
pub struct ParsedResume {
    pub record: ResumeRecord,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct ResumeParser {
    llm: Arc<dyn ChatCompletion>,
    extractor: Arc<dyn TextExtractor>,
    policy: RetryPolicy,
    streaming: bool,
}

impl ResumeParser {
    pub fn new(
        llm: Arc<dyn ChatCompletion>,
        extractor: Arc<dyn TextExtractor>,
        policy: RetryPolicy,
        streaming: bool,
    ) -> Self {
        Self {
            llm,
            extractor,
            policy,
            streaming,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// One full LLM round trip. Streamed replies are concatenated before returning.
    async fn fetch_response(&self, prompt: &Prompt) -> Result<String, LlmError> {
        if self.streaming {
            collect_stream(self.llm.stream(prompt).await?).await
        } else {
            self.llm.complete(prompt).await
        }
    }

    /// Runs request/parse cycles for already-extracted text until one yields a
    /// JSON object or the retry budget is spent.
    pub async fn parse_text(
        &self,
        file_name: &str,
        resume_text: &str,
    ) -> Result<ParsedResume, FileError> {
        let prompt = build_prompt(resume_text);
        let max_attempts = self.policy.max_attempts();
        let mut last_error = RepairError::NoJsonFound;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                warn!(
                    "Retrying parse for {} (attempt {}/{})",
                    file_name, attempt, max_attempts
                );
                tokio::time::sleep(self.policy.delay).await;
            }

            let response = self
                .fetch_response(&prompt)
                .await
                .map_err(|source| FileError::ServiceUnavailable { attempt, source })?;

            match repair_json(&response) {
                Ok(fields) => {
                    let record = ResumeRecord::new(file_name, fields)?;
                    return Ok(ParsedResume {
                        record,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    warn!(
                        "Parse attempt {}/{} for {} failed: {}",
                        attempt, max_attempts, file_name, e
                    );
                    last_error = e;
                }
            }
        }

        Err(FileError::ParseExhausted {
            attempts: max_attempts,
            last: last_error,
        })
    }

    /// Extracts and parses one upload.
    pub async fn process_upload(&self, upload: Upload) -> Result<ParsedResume, FileError> {
        let text = self
            .extractor
            .extract(&upload.file_name, upload.bytes)
            .await?;
        self.parse_text(&upload.file_name, &text).await
    }

    /// Processes every upload in order. Never fails as a whole.
    pub async fn process_batch(&self, uploads: Vec<Upload>) -> BatchReport {
        let mut report = BatchReport::new(uploads.len());

        for upload in uploads {
            let file_name = upload.file_name.clone();
            info!("Parsing {}", file_name);

            match self.process_upload(upload).await {
                Ok(parsed) => {
                    let missing = parsed.record.missing_fields();
                    if !missing.is_empty() {
                        warn!("{} is missing {}", file_name, missing.join(", "));
                    }
                    info!(
                        "Parsed {} as {} <{}>",
                        file_name,
                        parsed.record.name().unwrap_or_default(),
                        parsed.record.email().unwrap_or_default()
                    );
                    push_retry_notices(&mut report, &file_name, parsed.attempts);
                    report.outcomes.push(FileOutcome {
                        file_name,
                        status: FileStatus::Parsed,
                        attempts: parsed.attempts,
                    });
                    report.records.push(parsed.record);
                    report.parsed_count += 1;
                    info!(
                        "Resumes parsed: {} of {}",
                        report.parsed_count, report.total_files
                    );
                }
                Err(e) => record_failure(&mut report, file_name, e),
            }
        }

        report
    }
}

fn push_retry_notices(report: &mut BatchReport, file_name: &str, attempts: u32) {
    for attempt in 1..attempts {
        report.diagnostics.push(Diagnostic::Retrying {
            file_name: file_name.to_string(),
            attempt,
        });
    }
}

fn record_failure(report: &mut BatchReport, file_name: String, err: FileError) {
    let (status, attempts, diagnostic) = match err {
        FileError::Extract(ExtractError::UnsupportedFileType(extension)) => {
            warn!("Unsupported file type: {} ({})", extension, file_name);
            (
                FileStatus::Skipped,
                0,
                Diagnostic::UnsupportedFileType {
                    file_name: file_name.clone(),
                    extension,
                },
            )
        }
        FileError::Extract(ExtractError::ExtractionFailure(reason)) => {
            warn!("Skipping {}: {}", file_name, reason);
            (
                FileStatus::Skipped,
                0,
                Diagnostic::ExtractionFailed {
                    file_name: file_name.clone(),
                    reason,
                },
            )
        }
        FileError::ServiceUnavailable { attempt, source } => {
            error!(
                "LLM call for {} failed on attempt {}: {}",
                file_name, attempt, source
            );
            push_retry_notices(report, &file_name, attempt);
            (
                FileStatus::Failed,
                attempt,
                Diagnostic::ServiceUnavailable {
                    file_name: file_name.clone(),
                    reason: source.to_string(),
                },
            )
        }
        FileError::ParseExhausted { attempts, last } => {
            error!(
                "Failed to parse JSON for {} after {} attempts: {}",
                file_name, attempts, last
            );
            push_retry_notices(report, &file_name, attempts);
            (
                FileStatus::Failed,
                attempts,
                Diagnostic::ParseFailed {
                    file_name: file_name.clone(),
                    attempts,
                    reason: last.to_string(),
                },
            )
        }
        FileError::Record(e) => {
            error!("Discarding record for {:?}: {}", file_name, e);
            (
                FileStatus::Failed,
                1,
                Diagnostic::ParseFailed {
                    file_name: file_name.clone(),
                    attempts: 1,
                    reason: e.to_string(),
                },
            )
        }
    };

    report.diagnostics.push(diagnostic);
    report.outcomes.push(FileOutcome {
        file_name,
        status,
        attempts,
    });
}
