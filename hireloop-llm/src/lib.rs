//! Provider-agnostic LLM integration for Hireloop.
//!
//! This crate exposes a common [`traits::LlmClient`] interface and concrete
//! provider implementations for Ollama and OpenAI. The engine uses it as an
//! optional source of answers for application questions that neither the
//! configured answers nor the applicant profile cover.
//!
//! # Examples
//! ```no_run
//! use hireloop_config::LlmConfig;
//! use hireloop_llm::connect;
//!
//! # #[tokio::main]
//! # async fn main() -> hireloop_common::Result<()> {
//! let cfg = LlmConfig::Ollama {
//!     model: "llama3.2:3b".into(),
//!     endpoint: "http://localhost:11434".into(),
//!     temperature: None,
//!     max_tokens: None,
//! };
//! let client = connect(&cfg).await?;
//! assert!(!client.model_name().is_empty());
//! # Ok(())
//! # }
//! ```
pub mod ollama;
pub mod openai;
pub mod traits;

use hireloop_config::LlmConfig;
use ollama::OllamaClient;
use openai::OpenAiClient;
use std::sync::Arc;
use traits::LlmClient;

/// Build the client named by the configuration and make sure it is usable.
pub async fn connect(config: &LlmConfig) -> hireloop_common::Result<Arc<dyn LlmClient>> {
    match config {
        LlmConfig::Ollama {
            model,
            endpoint,
            temperature,
            max_tokens,
        } => {
            let client = OllamaClient::connect(endpoint, model)
                .await?
                .with_sampling(*temperature, *max_tokens);
            Ok(Arc::new(client))
        }
        LlmConfig::Openai {
            model,
            api_key,
            temperature,
            max_tokens,
            endpoint,
        } => {
            let client =
                OpenAiClient::new(endpoint, api_key, model)?.with_sampling(*temperature, *max_tokens);
            Ok(Arc::new(client))
        }
    }
}
