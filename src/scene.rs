// src/scene.rs
//! Scene records and their lifecycle. One `Scene` is one unit of video to
//! be produced; the orchestrator mutates each record in place as pipeline
//! stages complete.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-scene lifecycle status. `PreparingAssets` is skipped when continuity
/// determines the scene extends its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneStatus {
    Idle,
    Analyzing,
    PreparingAssets,
    Generating,
    Completed,
    Error,
}

impl SceneStatus {
    /// In flight means a pipeline stage currently owns the scene. At most
    /// one scene is in flight at a time.
    pub fn is_in_flight(&self) -> bool {
        !matches!(self, SceneStatus::Idle | SceneStatus::Completed | SceneStatus::Error)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SceneStatus::Completed | SceneStatus::Error)
    }
}

/// Opaque token referencing a previously produced clip, required to extend
/// it. The pipeline never inspects the contents; whatever the video service
/// returned is forwarded verbatim into the next extension request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationHandle(Value);

impl ContinuationHandle {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub(crate) fn as_value(&self) -> &Value {
        &self.0
    }
}

/// An inline image, base64-encoded the way the generative API carries
/// binary payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// Dense 1-based sequence index assigned by the parser.
    pub index: u32,
    pub title: String,
    /// The generation prompt.
    pub visual_prompt: String,
    /// Used only for continuity judgment, never sent to video generation.
    pub narrative_context: String,
    /// Explicit reference image from the source script, if any.
    pub reference_image_url: Option<String>,
    /// Seed image resolved by asset preparation.
    pub seed_image: Option<ImagePayload>,
    pub status: SceneStatus,
    /// Locator of the produced clip.
    pub video_uri: Option<String>,
    /// Handle the next scene needs if it extends this one.
    pub continuation: Option<ContinuationHandle>,
    /// Human-readable continuity rationale for observers.
    pub qa_feedback: Option<String>,
    /// Whether continuity judged this scene to extend its predecessor.
    pub extends_previous: Option<bool>,
}

impl Scene {
    pub fn new(
        index: u32,
        title: String,
        visual_prompt: String,
        narrative_context: String,
        reference_image_url: Option<String>,
    ) -> Self {
        Self {
            index,
            title,
            visual_prompt,
            narrative_context,
            reference_image_url,
            seed_image: None,
            status: SceneStatus::Idle,
            video_uri: None,
            continuation: None,
            qa_feedback: None,
            extends_previous: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_statuses() {
        assert!(!SceneStatus::Idle.is_in_flight());
        assert!(SceneStatus::Analyzing.is_in_flight());
        assert!(SceneStatus::PreparingAssets.is_in_flight());
        assert!(SceneStatus::Generating.is_in_flight());
        assert!(!SceneStatus::Completed.is_in_flight());
        assert!(!SceneStatus::Error.is_in_flight());
    }

    #[test]
    fn new_scene_starts_idle_and_empty() {
        let scene = Scene::new(1, "Opening".into(), "a foggy pier".into(), "intro".into(), None);
        assert_eq!(scene.status, SceneStatus::Idle);
        assert!(scene.video_uri.is_none());
        assert!(scene.continuation.is_none());
        assert!(scene.seed_image.is_none());
    }
}
