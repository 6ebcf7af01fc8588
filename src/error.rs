//! Error types for tradedec-ocr

use thiserror::Error;

/// Result type alias for tradedec-ocr
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tradedec-ocr
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// Input path is neither a PDF file nor a directory
    #[error("Invalid input path: {reason}")]
    InvalidInput { reason: String },

    /// Invalid page range
    #[error("Invalid page range: {range}")]
    InvalidPageRange { range: String },

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// Rotation that is not a multiple of 90 degrees
    #[error("Unsupported rotation: {degrees} degrees (must be a multiple of 90)")]
    InvalidRotation { degrees: i32 },

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// qpdf error
    #[error("qpdf error: {reason}")]
    QpdfError { reason: String },

    /// Tesseract missing or failing
    #[error("OCR error: {reason}")]
    Ocr { reason: String },

    /// Image encoding or transformation error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration error (missing key, bad host, unknown option)
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// LLM backend returned an error or could not be reached
    #[error("{provider} request failed: {reason}")]
    Provider { provider: String, reason: String },

    /// LLM backend did not answer in time
    #[error("{provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    /// Model answered with nothing
    #[error("AI model returned an empty response")]
    EmptyResponse,

    /// No `{` or `[` anywhere in the model output
    #[error("Could not find start of JSON ('{{' or '[') in model output")]
    NoJsonFound,

    /// Strict parse and repair both failed
    #[error("Could not repair JSON: {reason}")]
    JsonRepair { reason: String },

    /// Parsed JSON has an unexpected shape
    #[error("Unexpected JSON: {reason}")]
    UnexpectedJson { reason: String },

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV output error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn provider(provider: &str, reason: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure came from the model side rather than from local I/O or PDF handling.
    pub fn is_model_failure(&self) -> bool {
        matches!(
            self,
            Error::Provider { .. }
                | Error::Timeout { .. }
                | Error::EmptyResponse
                | Error::NoJsonFound
                | Error::JsonRepair { .. }
                | Error::UnexpectedJson { .. }
                | Error::HttpRequest(_)
        )
    }
}
