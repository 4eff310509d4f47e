// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that abort a production run. Tolerated failures (seed-image
/// preparation, unparseable continuity verdicts) never surface here; they
/// are logged as warnings and the pipeline continues.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("script parsing failed: {0}")]
    ScriptParse(String),

    #[error("{service} request failed: {message}")]
    Service { service: &'static str, message: String },

    #[error("video job for scene {scene_index} failed: {message}")]
    VideoJob { scene_index: u32, message: String },

    #[error("fetch of '{url}' failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
}

impl PipelineError {
    pub fn service(service: &'static str, message: impl Into<String>) -> Self {
        Self::Service {
            service,
            message: message.into(),
        }
    }
}
