//! In-process HTTP stub and a scripted provider

use super::VisionProvider;
use crate::config::ProviderKind;
use crate::error::{Error, Result};
use crate::pdf::PageImage;
use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub(crate) fn sample_page() -> PageImage {
    PageImage::from_image(&DynamicImage::ImageRgb8(RgbImage::new(8, 8))).unwrap()
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Answer one request with `status` and `body`.
///
/// Returns the base URL and a handle resolving to the raw request text.
pub(crate) async fn serve_once(status: u16, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let body = body.to_string();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];

        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                if buf.len() >= end + 4 + content_length(&text[..end]) {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();

        String::from_utf8_lossy(&buf).to_string()
    });

    (url, handle)
}

/// Accept one connection and never answer
pub(crate) async fn serve_silently() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    });

    (url, handle)
}

type Responder = Box<dyn Fn(&str) -> std::result::Result<String, String> + Send + Sync>;

/// Provider answering from a closure over the prompt
pub(crate) struct MockProvider {
    model: String,
    kind: ProviderKind,
    responder: Responder,
    pub prompts: Mutex<Vec<String>>,
    /// (width, height) of each image sent
    pub images: Mutex<Vec<(u32, u32)>>,
}

impl MockProvider {
    pub fn new(
        model: &str,
        responder: impl Fn(&str) -> std::result::Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            model: model.to_string(),
            kind: ProviderKind::Ollama,
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
        }
    }

    /// Always answer `response`
    pub fn answering(model: &str, response: &str) -> Self {
        let response = response.to_string();
        Self::new(model, move |_| Ok(response.clone()))
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }
}

#[async_trait]
impl VisionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn generate(&self, prompt: &str, image: &PageImage) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        self.images.lock().push((image.width, image.height));
        (self.responder)(prompt).map_err(|reason| Error::provider("mock", reason))
    }
}
