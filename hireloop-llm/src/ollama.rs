use crate::traits::{LlmClient, LlmResponse};
use async_trait::async_trait;
use hireloop_common::{HireloopError, Result};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

const OLLAMA_CONNECTION_ERROR: &str =
    "No running Ollama server detected. Start it with `ollama serve` or point llm.endpoint elsewhere";

/// Ollama client for local model inference.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OllamaClient {
    /// Create a new client and verify server/model availability.
    pub async fn connect(base_url: &str, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| HireloopError::Agent(format!("Failed to create HTTP client: {e}")))?;

        let ollama = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: None,
            max_tokens: None,
        };

        let models = ollama.fetch_available_models().await?;
        if !models.iter().any(|m| m == &ollama.model) {
            tracing::info!(model = %ollama.model, "llm.ollama.pull_model");
            ollama.pull_model().await?;
        }

        Ok(ollama)
    }

    /// Override sampling defaults applied when a caller passes `None`.
    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|_| HireloopError::Agent(OLLAMA_CONNECTION_ERROR.to_string()))?;

        if !resp.status().is_success() {
            return Err(HireloopError::Agent(OLLAMA_CONNECTION_ERROR.to_string()));
        }

        let val: JsonValue = resp
            .json()
            .await
            .map_err(|e| HireloopError::Agent(format!("Failed to parse models response: {e}")))?;

        Ok(val
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.get("name").and_then(|n| n.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn pull_model(&self) -> Result<()> {
        let url = format!("{}/api/pull", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "stream": false }))
            .send()
            .await
            .map_err(|e| HireloopError::Agent(format!("Failed to pull model: {e}")))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(HireloopError::Agent(format!(
                "Failed to pull model {}: HTTP {}",
                self.model,
                resp.status()
            )))
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let url = format!("{}/api/generate", self.base_url);

        let mut options = serde_json::Map::new();
        if let Some(temp) = temperature.or(self.temperature) {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = max_tokens.or(self.max_tokens) {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        let mut payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": options
        });
        if let Some(system) = system_prompt {
            payload["system"] = json!(system);
        }

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| HireloopError::Agent(format!("Generate request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(HireloopError::Agent(format!(
                "Generate failed: HTTP {}",
                resp.status()
            )));
        }

        let val: JsonValue = resp
            .json()
            .await
            .map_err(|e| HireloopError::Agent(format!("Failed to parse response: {e}")))?;

        Ok(LlmResponse {
            text: val
                .get("response")
                .and_then(|r| r.as_str())
                .unwrap_or_default()
                .to_string(),
            model: Some(self.model.clone()),
            tokens_used: val
                .get("eval_count")
                .and_then(|c| c.as_u64())
                .map(|c| c as u32),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.fetch_available_models().await.is_ok())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
