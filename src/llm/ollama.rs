//! Ollama REST backend (`/api/generate`)

use super::{http_client, map_request_error, VisionProvider};
use crate::config::ProviderKind;
use crate::error::{Error, Result};
use crate::pdf::PageImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const NAME: &str = "ollama";

/// Base URL for an Ollama host: scheme added when missing, trailing `/` removed
pub fn normalize_host(host: &str) -> Result<String> {
    let host = host.trim();
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    let base = with_scheme.trim_end_matches('/').to_string();

    url::Url::parse(&base).map_err(|e| Error::Config {
        reason: format!("invalid Ollama host '{host}': {e}"),
    })?;
    Ok(base)
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    /// Reasoning models may put everything here and leave `response` empty
    #[serde(default)]
    thinking: Option<String>,
}

pub struct OllamaApi {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaApi {
    pub fn new(host: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            base_url: normalize_host(host)?,
            model: model.to_string(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl VisionProvider for OllamaApi {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn generate(&self, prompt: &str, image: &PageImage) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            images: vec![image.to_base64()],
            stream: false,
            format: "json",
        };

        tracing::info!(url = %url, model = %self.model, timeout_secs = self.timeout_secs, "sending request to Ollama");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_request_error(NAME, self.timeout_secs, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_request_error(NAME, self.timeout_secs, e))?;

        if !status.is_success() {
            return Err(Error::provider(
                NAME,
                format!("API error ({status}): {}", body.trim()),
            ));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            Error::provider(NAME, format!("JSON decode error: {e}. Raw response: {body}"))
        })?;

        if !parsed.response.trim().is_empty() {
            return Ok(parsed.response);
        }
        match parsed.thinking.filter(|t| !t.trim().is_empty()) {
            Some(thinking) => {
                tracing::debug!("empty response field, using thinking output");
                Ok(thinking)
            }
            None => Err(Error::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{sample_page, serve_once, serve_silently};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("localhost:11434", "http://localhost:11434")]
    #[case("http://gpu-box:11435/", "http://gpu-box:11435")]
    #[case(" https://ollama.internal ", "https://ollama.internal")]
    fn test_normalize_host(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_host(input).unwrap(), expected);
    }

    #[test]
    fn test_normalize_host_invalid() {
        assert!(matches!(normalize_host("http://"), Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_generate_request_and_response() {
        let (url, request) =
            serve_once(200, r#"{"model":"m","response":"{\"a\": 1}","done":true}"#).await;

        let api = OllamaApi::new(&url, "qwen3-vl:32b", 10).unwrap();
        let out = api.generate("extract it", &sample_page()).await.unwrap();
        assert_eq!(out, r#"{"a": 1}"#);

        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /api/generate "));
        let body: serde_json::Value =
            serde_json::from_str(&raw[raw.find("\r\n\r\n").unwrap() + 4..]).unwrap();
        assert_eq!(body["model"], "qwen3-vl:32b");
        assert_eq!(body["prompt"], "extract it");
        assert_eq!(body["stream"], false);
        assert_eq!(body["format"], "json");
        assert_eq!(body["images"][0], sample_page().to_base64());
    }

    #[tokio::test]
    async fn test_thinking_fallback() {
        let (url, _request) =
            serve_once(200, r#"{"response":"","thinking":"{\"value\": \"x\"}"}"#).await;
        let api = OllamaApi::new(&url, "m", 10).unwrap();
        assert_eq!(
            api.generate("p", &sample_page()).await.unwrap(),
            r#"{"value": "x"}"#
        );
    }

    #[tokio::test]
    async fn test_empty_response() {
        let (url, _request) = serve_once(200, r#"{"response":""}"#).await;
        let api = OllamaApi::new(&url, "m", 10).unwrap();
        assert!(matches!(
            api.generate("p", &sample_page()).await,
            Err(Error::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_error_status() {
        let (url, _request) = serve_once(404, r#"{"error":"model 'm' not found"}"#).await;
        let api = OllamaApi::new(&url, "m", 10).unwrap();
        let err = api.generate("p", &sample_page()).await.unwrap_err();
        assert!(matches!(&err, Error::Provider { reason, .. } if reason.contains("not found")));
    }

    #[tokio::test]
    async fn test_non_json_body() {
        let (url, _request) = serve_once(200, "<html>proxy error</html>").await;
        let api = OllamaApi::new(&url, "m", 10).unwrap();
        let err = api.generate("p", &sample_page()).await.unwrap_err();
        assert!(matches!(&err, Error::Provider { reason, .. } if reason.contains("proxy error")));
    }

    #[tokio::test]
    async fn test_timeout() {
        let (url, _server) = serve_silently().await;
        let api = OllamaApi::new(&url, "m", 1).unwrap();
        assert!(matches!(
            api.generate("p", &sample_page()).await,
            Err(Error::Timeout { seconds: 1, .. })
        ));
    }
}
