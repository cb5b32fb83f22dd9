//! Axum route handlers for the Resume API.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::errors::AppError;
use crate::export::{to_xlsx, ResumeTable, EXPORT_FILE_NAME, XLSX_CONTENT_TYPE};
use crate::resumes::models::{BatchReport, Upload};
use crate::state::AppState;

const PARSED_HEADER: HeaderName = HeaderName::from_static("x-resumes-parsed");
const TOTAL_HEADER: HeaderName = HeaderName::from_static("x-resumes-total");

/// POST /api/v1/resumes/parse
///
/// Multipart upload of PDF/DOCX resumes. Returns the parsed records together
/// with per-file diagnostics and the parsed count.
pub async fn handle_parse(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<BatchReport>, AppError> {
    let uploads = read_uploads(multipart).await?;
    let report = state.parser.process_batch(uploads).await;
    Ok(Json(report))
}

/// POST /api/v1/resumes/export
///
/// Same input as `/parse`; answers with `parsed_resumes.xlsx` as an attachment.
/// When no file parses, the export is skipped and the response is 204.
pub async fn handle_export(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let uploads = read_uploads(multipart).await?;
    let report = state.parser.process_batch(uploads).await;

    let counts = [
        (PARSED_HEADER, report.parsed_count.to_string()),
        (TOTAL_HEADER, report.total_files.to_string()),
    ];

    if report.records.is_empty() {
        info!("No resumes parsed; skipping export");
        return Ok((StatusCode::NO_CONTENT, counts).into_response());
    }

    // Workbook assembly is CPU-bound; keep it off the async executor.
    let table = ResumeTable::from_records(&report.records);
    let xlsx = tokio::task::spawn_blocking(move || to_xlsx(&table))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in export: {e}")))??;

    info!(
        "Exported {} of {} resumes ({} bytes)",
        report.parsed_count,
        report.total_files,
        xlsx.len()
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
            ),
        ],
        counts,
        xlsx,
    )
        .into_response())
}

/// Collects every multipart part that carries a file name, in upload order.
async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, AppError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            // Non-file form fields are drained and ignored.
            field.bytes().await.map_err(multipart_error)?;
            continue;
        };
        let bytes = field.bytes().await.map_err(multipart_error)?;
        uploads.push(Upload::new(file_name, bytes));
    }

    if uploads.is_empty() {
        return Err(AppError::Validation(
            "Upload at least one PDF or DOCX resume".to_string(),
        ));
    }

    Ok(uploads)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Invalid multipart upload: {}", e.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::resumes::pipeline::tests::{FixtureExtractor, ScriptedLlm, JANE_JSON};
    use crate::resumes::pipeline::{ResumeParser, RetryPolicy};
    use crate::routes::build_router;
    use crate::state::AppState;

    use super::*;

    const BOUNDARY: &str = "resume-boundary";

    fn app(llm: ScriptedLlm, extractor: FixtureExtractor) -> axum::Router {
        let config = Config::for_tests();
        let parser = ResumeParser::new(
            Arc::new(llm),
            Arc::new(extractor),
            RetryPolicy {
                max_retries: 2,
                delay: std::time::Duration::ZERO,
            },
            true,
        );
        build_router(AppState { parser, config })
    }

    fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nbatch 1\r\n"
            )
            .as_bytes(),
        );
        for (name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(uri: &str, files: &[(&str, &[u8])]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(files)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_parse_returns_records_and_diagnostics() {
        let app = app(
            ScriptedLlm::default().reply("jane text", JANE_JSON),
            FixtureExtractor::default().with("jane.pdf", "jane text"),
        );

        let response = app
            .oneshot(upload_request(
                "/api/v1/resumes/parse",
                &[("jane.pdf", &b"%PDF"[..]), ("notes.txt", &b"hi"[..])],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["parsed_count"], 1);
        assert_eq!(body["total_files"], 2);
        assert_eq!(body["records"][0]["Name"], "Jane Doe");
        assert_eq!(body["records"][0]["File Name"], "jane.pdf");
        assert_eq!(body["diagnostics"][0]["kind"], "unsupported_file_type");
        assert_eq!(body["diagnostics"][0]["extension"], "txt");
    }

    #[tokio::test]
    async fn test_parse_without_files_is_rejected() {
        let app = app(ScriptedLlm::default(), FixtureExtractor::default());

        let response = app
            .oneshot(upload_request("/api/v1/resumes/parse", &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_returns_xlsx_attachment() {
        let app = app(
            ScriptedLlm::default().reply("jane text", JANE_JSON),
            FixtureExtractor::default().with("jane.pdf", "jane text"),
        );

        let response = app
            .oneshot(upload_request("/api/v1/resumes/export", &[("jane.pdf", &b"%PDF"[..])]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], XLSX_CONTENT_TYPE);
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"parsed_resumes.xlsx\""
        );
        assert_eq!(headers["x-resumes-parsed"], "1");
        assert_eq!(headers["x-resumes-total"], "1");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_export_is_skipped_when_nothing_parses() {
        let app = app(ScriptedLlm::default(), FixtureExtractor::default());

        let response = app
            .oneshot(upload_request("/api/v1/resumes/export", &[("notes.txt", &b"hi"[..])]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["x-resumes-parsed"], "0");
        assert_eq!(response.headers()["x-resumes-total"], "1");
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let app = app(ScriptedLlm::default(), FixtureExtractor::default());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
