//! Remote OCR cleanup over an OpenAI-compatible chat completions endpoint.
//!
//! Endpoint, model and API key are injected configuration; nothing here is
//! hardcoded beyond the public default endpoint.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Result, SensaiError};
use crate::extraction::TextCleanup;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const SYSTEM_PROMPT: &str = "You clean up OCR output for a blind user. Fix obvious \
recognition errors, remove garbage characters and return only the corrected text. \
Do not add commentary.";

#[derive(Debug, Clone)]
pub struct RemoteCleanupConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl RemoteCleanupConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            timeout: Duration::from_secs(4),
        }
    }
}

pub struct RemoteCleanup {
    config: RemoteCleanupConfig,
    client: reqwest::blocking::Client,
}

impl RemoteCleanup {
    /// # Errors
    /// Fails if the API key is blank or the HTTP client cannot be built.
    pub fn new(config: RemoteCleanupConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SensaiError::Other(anyhow::anyhow!(
                "remote cleanup requires an API key"
            )));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SensaiError::Other(anyhow::anyhow!("cleanup client build failed: {e}")))?;
        Ok(Self { config, client })
    }
}

impl TextCleanup for RemoteCleanup {
    fn clean(&mut self, text: &str) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| SensaiError::ExtractionFailed(format!("cleanup request failed: {e}")))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "cleanup request returned non-success status");
            return Err(SensaiError::ExtractionFailed(format!(
                "cleanup endpoint returned {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .map_err(|e| SensaiError::ExtractionFailed(format!("cleanup json parse failed: {e}")))?;

        let cleaned = payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        debug!(chars = cleaned.len(), "cleanup response received");
        Ok(cleaned)
    }
}
