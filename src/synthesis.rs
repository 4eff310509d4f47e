// src/synthesis.rs
//! Video Synthesizer: turns one scene into a playable clip through the
//! long-running job service. Resolves the effective generation mode,
//! submits the request, and polls at the configured interval until the job
//! is terminal. Job errors and missing clip locators are fatal for the run.

use crate::error::{PipelineError, Result};
use crate::progress::{EventRole, ProgressLog};
use crate::scene::{ContinuationHandle, ImagePayload, Scene};
use crate::services::{PollPolicy, VideoJobService, VideoJobStatus, VideoMode, VideoRequest};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub video_uri: String,
    /// Handle the next scene needs to extend this clip, when the service
    /// returned one.
    pub continuation: Option<ContinuationHandle>,
}

pub struct VideoSynthesizer {
    jobs: Arc<dyn VideoJobService>,
    poll: Arc<dyn PollPolicy>,
}

/// Extension is used only when it is both desired and technically
/// possible: a true continuity verdict with no handle resolves to fresh.
pub fn resolve_mode(extend_requested: bool, handle: Option<&ContinuationHandle>) -> VideoMode {
    if extend_requested && handle.is_some() {
        VideoMode::Extension
    } else {
        VideoMode::Fresh
    }
}

impl VideoSynthesizer {
    pub fn new(jobs: Arc<dyn VideoJobService>, poll: Arc<dyn PollPolicy>) -> Self {
        Self { jobs, poll }
    }

    pub async fn produce(
        &self,
        scene: &Scene,
        extend_requested: bool,
        continuation: Option<&ContinuationHandle>,
        seed_image: Option<ImagePayload>,
        log: &ProgressLog,
    ) -> Result<SynthesisOutcome> {
        let mode = resolve_mode(extend_requested, continuation);

        let request = match mode {
            VideoMode::Extension => {
                log.info(
                    EventRole::Synthesis,
                    format!("scene {}: extending the previous clip", scene.index),
                );
                VideoRequest {
                    prompt: scene.visual_prompt.clone(),
                    mode,
                    seed_image: None,
                    continuation: continuation.cloned(),
                }
            }
            VideoMode::Fresh => {
                log.info(
                    EventRole::Synthesis,
                    format!("scene {}: generating a fresh clip", scene.index),
                );
                if seed_image.is_some() {
                    log.info(
                        EventRole::Synthesis,
                        format!("scene {}: attaching seed image", scene.index),
                    );
                }
                VideoRequest {
                    prompt: scene.visual_prompt.clone(),
                    mode,
                    seed_image,
                    continuation: None,
                }
            }
        };

        let job = self.jobs.submit(&request).await?;
        info!("scene {}: video job submitted ({})", scene.index, job.name);
        log.info(
            EventRole::Synthesis,
            format!("scene {}: video job submitted, polling until done", scene.index),
        );

        loop {
            let status = self.jobs.poll(&job).await?;
            match status {
                VideoJobStatus::Pending => {
                    debug!("scene {}: job still running", scene.index);
                    self.poll.wait().await;
                }
                VideoJobStatus::Failed { message } => {
                    return Err(PipelineError::VideoJob {
                        scene_index: scene.index,
                        message,
                    });
                }
                VideoJobStatus::Done {
                    video_uri,
                    continuation,
                } => {
                    let video_uri = video_uri.ok_or_else(|| PipelineError::VideoJob {
                        scene_index: scene.index,
                        message: "job completed without a clip locator".to_string(),
                    })?;
                    info!("scene {}: clip ready at {}", scene.index, video_uri);
                    return Ok(SynthesisOutcome {
                        video_uri,
                        continuation,
                    });
                }
            }
        }
    }
}
