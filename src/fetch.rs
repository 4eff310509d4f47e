// src/fetch.rs
use crate::error::{PipelineError, Result};
use crate::services::{FetchedResource, RemoteFetcher};
use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

/// Reference-image retrieval over plain HTTP. Non-2xx responses fail with
/// the status in the message.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource> {
        info!("fetching reference image: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(PipelineError::Fetch {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        let bytes = response.bytes().await.map_err(|e| PipelineError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(FetchedResource {
            mime_type,
            bytes: bytes.to_vec(),
        })
    }
}
