// src/services.rs
//! Contracts for the external collaborators. The pipeline depends on these
//! traits only; the Gemini client and the HTTP fetcher implement them, and
//! tests substitute scripted fakes.

use crate::error::Result;
use crate::scene::{ContinuationHandle, ImagePayload};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Structured-output text generation: prompt plus a target JSON schema,
/// returning the decoded structured value.
#[async_trait]
pub trait StructuredTextService: Send + Sync {
    async fn generate_structured(&self, prompt: &str, schema: Value) -> Result<Value>;
}

/// Text-to-image generation. Returns zero or more payloads; callers use
/// the first.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate_images(&self, prompt: &str) -> Result<Vec<ImagePayload>>;
}

/// Remote resource retrieval for user-supplied reference images.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResource>;
}

#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// How a clip is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    /// New shot: 1080p on the fast model variant, optionally seeded with
    /// a starting image.
    Fresh,
    /// Continuous shot: 720p on the high-fidelity variant, extending the
    /// previous clip through its continuation handle.
    Extension,
}

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: String,
    pub mode: VideoMode,
    /// Seed image, fresh mode only.
    pub seed_image: Option<ImagePayload>,
    /// Continuation handle, extension mode only.
    pub continuation: Option<ContinuationHandle>,
}

/// Reference to a submitted long-running video job.
#[derive(Debug, Clone)]
pub struct VideoJobRef {
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum VideoJobStatus {
    /// Still running; ask again later.
    Pending,
    /// The job itself reported an error.
    Failed { message: String },
    /// Terminal success. A missing URI is still a hard failure for the
    /// scene; the caller enforces that.
    Done {
        video_uri: Option<String>,
        continuation: Option<ContinuationHandle>,
    },
}

impl VideoJobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VideoJobStatus::Pending)
    }
}

/// Long-running video generation: submit once, then query status until
/// terminal.
#[async_trait]
pub trait VideoJobService: Send + Sync {
    async fn submit(&self, request: &VideoRequest) -> Result<VideoJobRef>;
    async fn poll(&self, job: &VideoJobRef) -> Result<VideoJobStatus>;
}

/// The wait between status queries, as injectable policy rather than a
/// hardcoded sleep.
#[async_trait]
pub trait PollPolicy: Send + Sync {
    async fn wait(&self);
}

/// Default policy: a fixed interval on the tokio timer.
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl PollPolicy for FixedInterval {
    async fn wait(&self) {
        tokio::time::sleep(self.interval).await;
    }
}
