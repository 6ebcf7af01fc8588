//! `ollama run` subprocess backend

use super::VisionProvider;
use crate::config::ProviderKind;
use crate::error::{Error, Result};
use crate::pdf::PageImage;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const NAME: &str = "ollama_cli";

/// Sends `"<prompt> <image path>"` to `ollama run <model>` on stdin
pub struct OllamaCli {
    program: String,
    host: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaCli {
    pub fn new(host: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            program: "ollama".to_string(),
            host: host.to_string(),
            model: model.to_string(),
            timeout_secs,
        }
    }

    /// Use another executable in place of `ollama`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl VisionProvider for OllamaCli {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OllamaCli
    }

    async fn generate(&self, prompt: &str, image: &PageImage) -> Result<String> {
        // Kept alive until the process has finished with it
        let image_file = tempfile::Builder::new()
            .prefix("tradedec-page-")
            .suffix(".jpg")
            .tempfile()?;
        std::fs::write(image_file.path(), &image.jpeg)?;

        let input = format!("{prompt} {}", image_file.path().display());

        tracing::info!(
            command = %format!("{} run {}", self.program, self.model),
            timeout_secs = self.timeout_secs,
            "running Ollama CLI"
        );

        let mut child = Command::new(&self.program)
            .args(["run", self.model.as_str()])
            .env("OLLAMA_HOST", &self.host)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::provider(
                        NAME,
                        format!("'{}' command not found. Is it installed and in your PATH?", self.program),
                    )
                } else {
                    Error::Io(e)
                }
            })?;

        let stdin = child.stdin.take();
        let run = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input.as_bytes()).await?;
                // Closing stdin ends the prompt
                drop(stdin);
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(Duration::from_secs(self.timeout_secs), run).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Timeout {
                    provider: NAME.to_string(),
                    seconds: self.timeout_secs,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::provider(
                NAME,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
