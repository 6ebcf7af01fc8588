//! Google Gemini `generateContent` backend

use super::{http_client, map_request_error, VisionProvider};
use crate::config::ProviderKind;
use crate::error::{Error, Result};
use crate::pdf::PageImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const NAME: &str = "gemini";

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

pub struct Gemini {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl Gemini {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl VisionProvider for Gemini {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate(&self, prompt: &str, image: &PageImage) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    RequestPart::Text {
                        text: prompt.to_string(),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: image.to_base64(),
                        },
                    },
                ],
            }],
        };

        tracing::info!(model = %self.model, timeout_secs = self.timeout_secs, "sending request to Gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
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

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| Error::provider(NAME, format!("JSON decode error: {e}")))?;

        if let Some(reason) = parsed
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(Error::provider(NAME, format!("prompt blocked: {reason}")));
        }

        let Some(candidate) = parsed.candidates.into_iter().next() else {
            return Err(Error::EmptyResponse);
        };

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            tracing::warn!(finish_reason = ?candidate.finish_reason, "Gemini returned no text");
            return Err(Error::EmptyResponse);
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{sample_page, serve_once};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_request_shape_and_text_concatenation() {
        let (url, request) = serve_once(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":" 1}"}]},"finishReason":"STOP"}]}"#,
        )
        .await;

        let gemini = Gemini::new(&url, "secret-key", "gemini-2.5-pro", 10).unwrap();
        let out = gemini.generate("read the form", &sample_page()).await.unwrap();
        assert_eq!(out, r#"{"a": 1}"#);

        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /v1beta/models/gemini-2.5-pro:generateContent "));
        assert!(raw.to_ascii_lowercase().contains("x-goog-api-key: secret-key"));

        let body: serde_json::Value =
            serde_json::from_str(&raw[raw.find("\r\n\r\n").unwrap() + 4..]).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "read the form");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], sample_page().to_base64());
    }

    #[tokio::test]
    async fn test_blocked_prompt() {
        let (url, _request) =
            serve_once(200, r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).await;
        let gemini = Gemini::new(&url, "k", "m", 10).unwrap();
        let err = gemini.generate("p", &sample_page()).await.unwrap_err();
        assert!(matches!(&err, Error::Provider { reason, .. } if reason.contains("SAFETY")));
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let (url, _request) = serve_once(200, r#"{"candidates":[]}"#).await;
        let gemini = Gemini::new(&url, "k", "m", 10).unwrap();
        assert!(matches!(
            gemini.generate("p", &sample_page()).await,
            Err(Error::EmptyResponse)
        ));

        let (url, _request) =
            serve_once(200, r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#).await;
        let gemini = Gemini::new(&url, "k", "m", 10).unwrap();
        assert!(matches!(
            gemini.generate("p", &sample_page()).await,
            Err(Error::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let (url, _request) =
            serve_once(400, r#"{"error":{"message":"API key not valid"}}"#).await;
        let gemini = Gemini::new(&url, "bad", "m", 10).unwrap();
        let err = gemini.generate("p", &sample_page()).await.unwrap_err();
        assert!(matches!(&err, Error::Provider { reason, .. } if reason.contains("API key not valid")));
    }
}
