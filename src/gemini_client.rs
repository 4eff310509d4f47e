// src/gemini_client.rs
//! Client for the Gemini-family generative APIs: structured text output,
//! Imagen image generation, and Veo long-running video jobs. Implements the
//! service contracts the pipeline is written against.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::scene::{ContinuationHandle, ImagePayload};
use crate::services::{
    ImageService, StructuredTextService, VideoJobRef, VideoJobService, VideoJobStatus, VideoMode,
    VideoRequest,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const TEXT_MODEL: &str = "gemini-2.5-flash";
const IMAGE_MODEL: &str = "imagen-4.0-generate-001";
/// Higher-fidelity variant, used when extending a previous clip.
const VIDEO_MODEL_QUALITY: &str = "veo-3.1-generate-preview";
/// Faster variant for fresh shots.
const VIDEO_MODEL_FAST: &str = "veo-3.1-fast-generate-preview";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
    role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64_encoded: String,
    #[serde(rename = "mimeType", default = "default_image_mime")]
    mime_type: String,
}

fn default_image_mime() -> String {
    "image/png".to_string()
}

impl GeminiClient {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Gemini API error: {}", error_text);
            return Err(PipelineError::service("gemini", error_text));
        }

        Ok(response.json::<Value>().await?)
    }

    /// Pull the first candidate's text out of a generateContent response
    /// and decode it as JSON.
    fn decode_structured(value: Value) -> Result<Value> {
        let response: GenerateContentResponse = serde_json::from_value(value)?;
        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| PipelineError::service("gemini", "response carried no candidate text"))?;

        Ok(serde_json::from_str(&text)?)
    }

    fn video_model(mode: VideoMode) -> &'static str {
        match mode {
            VideoMode::Fresh => VIDEO_MODEL_FAST,
            VideoMode::Extension => VIDEO_MODEL_QUALITY,
        }
    }

    fn video_resolution(mode: VideoMode) -> &'static str {
        match mode {
            VideoMode::Fresh => "1080p",
            VideoMode::Extension => "720p",
        }
    }

    /// Translate a raw operation document into a job status.
    fn decode_operation(value: &Value) -> VideoJobStatus {
        if !value["done"].as_bool().unwrap_or(false) {
            return VideoJobStatus::Pending;
        }

        if let Some(error) = value.get("error") {
            let message = error["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return VideoJobStatus::Failed { message };
        }

        let video = value["response"]["generateVideoResponse"]["generatedSamples"]
            .as_array()
            .and_then(|samples| samples.first())
            .map(|sample| sample["video"].clone());

        match video {
            Some(video) => VideoJobStatus::Done {
                video_uri: video["uri"].as_str().map(str::to_string),
                continuation: Some(ContinuationHandle::new(video)),
            },
            None => VideoJobStatus::Done {
                video_uri: None,
                continuation: None,
            },
        }
    }
}

#[async_trait]
impl StructuredTextService for GeminiClient {
    async fn generate_structured(&self, prompt: &str, schema: Value) -> Result<Value> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, TEXT_MODEL, self.api_key
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
                role: Some("user".to_string()),
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema,
            },
        };

        tracing::debug!("structured generation request to {}", TEXT_MODEL);
        let body = serde_json::to_value(&request)?;
        let response = self.post(&url, &body).await?;
        Self::decode_structured(response)
    }
}

#[async_trait]
impl ImageService for GeminiClient {
    async fn generate_images(&self, prompt: &str) -> Result<Vec<ImagePayload>> {
        let url = format!(
            "{}/models/{}:predict?key={}",
            self.base_url, IMAGE_MODEL, self.api_key
        );

        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "numberOfImages": 1,
                "aspectRatio": "16:9"
            }
        });

        tracing::debug!("image generation request to {}", IMAGE_MODEL);
        let response = self.post(&url, &body).await?;
        let decoded: PredictResponse = serde_json::from_value(response)?;

        Ok(decoded
            .predictions
            .into_iter()
            .map(|p| ImagePayload {
                mime_type: p.mime_type,
                data_base64: p.bytes_base64_encoded,
            })
            .collect())
    }
}

#[async_trait]
impl VideoJobService for GeminiClient {
    async fn submit(&self, request: &VideoRequest) -> Result<VideoJobRef> {
        let model = Self::video_model(request.mode);
        let url = format!(
            "{}/models/{}:predictLongRunning?key={}",
            self.base_url, model, self.api_key
        );

        let mut instance = json!({ "prompt": request.prompt });
        if let Some(seed) = &request.seed_image {
            instance["image"] = json!({
                "bytesBase64Encoded": seed.data_base64,
                "mimeType": seed.mime_type,
            });
        }
        if let Some(handle) = &request.continuation {
            instance["video"] = handle.as_value().clone();
        }

        let body = json!({
            "instances": [instance],
            "parameters": {
                "aspectRatio": "16:9",
                "resolution": Self::video_resolution(request.mode),
                "numberOfVideos": 1
            }
        });

        tracing::info!("submitting video job to {} ({:?})", model, request.mode);
        let response = self.post(&url, &body).await?;
        let name = response["name"]
            .as_str()
            .ok_or_else(|| PipelineError::service("gemini", "operation response carried no name"))?
            .to_string();

        Ok(VideoJobRef { name })
    }

    async fn poll(&self, job: &VideoJobRef) -> Result<VideoJobStatus> {
        let url = format!("{}/{}?key={}", self.base_url, job.name, self.api_key);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::service("gemini", error_text));
        }

        let value = response.json::<Value>().await?;
        Ok(Self::decode_operation(&value))
    }
}
