// src/assets.rs
//! Asset Preparer: resolves the seed image for a fresh-mode scene. A scene
//! with an explicit reference URL gets it fetched and inlined; otherwise a
//! starting frame is synthesized from the visual prompt. Both failure paths
//! are scene-local: a warning is logged and generation proceeds text-only.

use crate::progress::{EventRole, ProgressLog};
use crate::scene::{ImagePayload, Scene};
use crate::services::{ImageService, RemoteFetcher};
use base64::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AssetPreparer {
    fetcher: Arc<dyn RemoteFetcher>,
    images: Arc<dyn ImageService>,
}

impl AssetPreparer {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, images: Arc<dyn ImageService>) -> Self {
        Self { fetcher, images }
    }

    /// Obtain a seed image for the scene, or `None` if neither strategy
    /// produced one. Never fails the run.
    pub async fn prepare(&self, scene: &Scene, log: &ProgressLog) -> Option<ImagePayload> {
        match &scene.reference_image_url {
            Some(url) => self.fetch_reference(scene, url, log).await,
            None => self.synthesize_frame(scene, log).await,
        }
    }

    async fn fetch_reference(
        &self,
        scene: &Scene,
        url: &str,
        log: &ProgressLog,
    ) -> Option<ImagePayload> {
        match self.fetcher.fetch(url).await {
            Ok(resource) => {
                info!(
                    "scene {}: reference image fetched ({} bytes)",
                    scene.index,
                    resource.bytes.len()
                );
                Some(ImagePayload {
                    mime_type: resource.mime_type,
                    data_base64: BASE64_STANDARD.encode(&resource.bytes),
                })
            }
            Err(e) => {
                warn!("scene {}: reference image fetch failed: {}", scene.index, e);
                log.warning(
                    EventRole::Assets,
                    format!(
                        "scene {}: could not fetch reference image, generating without a seed ({})",
                        scene.index, e
                    ),
                );
                None
            }
        }
    }

    async fn synthesize_frame(&self, scene: &Scene, log: &ProgressLog) -> Option<ImagePayload> {
        match self.images.generate_images(&scene.visual_prompt).await {
            Ok(payloads) => match payloads.into_iter().next() {
                Some(payload) => {
                    info!("scene {}: starting frame synthesized", scene.index);
                    Some(payload)
                }
                None => {
                    log.warning(
                        EventRole::Assets,
                        format!(
                            "scene {}: image service returned no frames, generating without a seed",
                            scene.index
                        ),
                    );
                    None
                }
            },
            Err(e) => {
                warn!("scene {}: frame synthesis failed: {}", scene.index, e);
                log.warning(
                    EventRole::Assets,
                    format!(
                        "scene {}: starting frame synthesis failed, generating without a seed ({})",
                        scene.index, e
                    ),
                );
                None
            }
        }
    }
}
