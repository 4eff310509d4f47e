// src/config.rs
use crate::error::{PipelineError, Result};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Configuration resolved once at startup and injected into the pipeline.
/// Components never read the environment themselves.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_key: String,
    pub base_url: String,
    /// Fixed wait between status queries of a submitted video job.
    pub poll_interval: Duration,
}

impl PipelineConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    /// Resolve configuration from the environment. `GEMINI_API_KEY` is
    /// required; `GEMINI_BASE_URL` and `VIDEO_POLL_INTERVAL_SECS` override
    /// the defaults.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| PipelineError::MissingConfig("GEMINI_API_KEY"))?;

        let mut config = Self::new(api_key);

        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(secs) = std::env::var("VIDEO_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.poll_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let config = PipelineConfig::new("key".to_string());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn poll_interval_override() {
        let config =
            PipelineConfig::new("key".to_string()).with_poll_interval(Duration::from_millis(100));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }
}
