//! OCR through the Tesseract command-line tool

use super::page_image::PageImage;
use crate::error::{Error, Result};
use std::io::Write;
use std::process::Command;

/// Recognizes text in a rendered page
pub trait OcrEngine: Send + Sync {
    /// `lang` uses Tesseract language codes, e.g. `chi_sim+eng`
    fn recognize(&self, image: &PageImage, lang: &str) -> Result<String>;
}

/// Runs `tesseract <image> stdout -l <lang>`
#[derive(Debug, Clone)]
pub struct Tesseract {
    program: String,
}

impl Default for Tesseract {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl Tesseract {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl OcrEngine for Tesseract {
    fn recognize(&self, image: &PageImage, lang: &str) -> Result<String> {
        let mut file = tempfile::Builder::new()
            .prefix("tradedec-ocr-")
            .suffix(".jpg")
            .tempfile()?;
        file.write_all(&image.jpeg)?;
        file.flush()?;

        let output = Command::new(&self.program)
            .arg(file.path())
            .arg("stdout")
            .args(["-l", lang])
            .output()
            .map_err(|e| Error::Ocr {
                reason: if e.kind() == std::io::ErrorKind::NotFound {
                    format!("{} is not installed or not in PATH", self.program)
                } else {
                    format!("failed to launch {}: {e}", self.program)
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Ocr {
                reason: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    stderr.trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
