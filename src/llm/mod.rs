//! Vision LLM backends and prompt templates

mod gemini;
mod ollama;
mod ollama_cli;
mod prompt;

#[cfg(test)]
pub(crate) mod testing;

pub use gemini::{Gemini, GEMINI_API_BASE};
pub use ollama::{normalize_host, OllamaApi};
pub use ollama_cli::OllamaCli;
pub use prompt::{
    render_verify_prompt, DocumentType, DECLARATION_PROMPT, EXTRACTED_TEXT_PLACEHOLDER,
    FIELD_NAME_PLACEHOLDER, VERIFY_PROMPT,
};

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{Error, Result};
use crate::pdf::PageImage;
use async_trait::async_trait;

/// A model that answers a text prompt about one page image
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Backend name used in logs and errors
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Raw model output for `prompt` with `image` attached
    async fn generate(&self, prompt: &str, image: &PageImage) -> Result<String>;
}

/// Build the backend selected by `config`
pub fn build_provider(config: &ProviderConfig) -> Result<Box<dyn VisionProvider>> {
    let provider: Box<dyn VisionProvider> = match config.kind {
        ProviderKind::Ollama => Box::new(OllamaApi::new(
            &config.ollama_host,
            &config.model,
            config.timeout_secs,
        )?),
        ProviderKind::OllamaCli => Box::new(OllamaCli::new(
            &config.ollama_host,
            &config.model,
            config.timeout_secs,
        )),
        ProviderKind::Gemini => {
            let api_key = config.api_key.as_deref().ok_or_else(|| Error::Config {
                reason: "--api-key or GOOGLE_API_KEY is required for Gemini".to_string(),
            })?;
            Box::new(Gemini::new(
                GEMINI_API_BASE,
                api_key,
                &config.model,
                config.timeout_secs,
            )?)
        }
    };

    tracing::debug!(
        provider = provider.name(),
        model = provider.model(),
        timeout_secs = config.timeout_secs,
        "provider ready"
    );
    Ok(provider)
}

/// Map a transport error, keeping timeouts distinct
pub(crate) fn map_request_error(provider: &str, timeout_secs: u64, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            provider: provider.to_string(),
            seconds: timeout_secs,
        }
    } else {
        Error::HttpRequest(e)
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}
