use crate::config::Config;
use crate::resumes::pipeline::ResumeParser;

/// Shared application state injected into all route handlers via Axum extractors.
/// Immutable after startup; each request clones it.
#[derive(Clone)]
pub struct AppState {
    /// Pipeline with the LLM client and extractor injected at startup.
    pub parser: ResumeParser,
    pub config: Config,
}
