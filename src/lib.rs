//! Customs trade declaration extraction
//!
//! This crate turns scanned or digital export declarations (报关单) into
//! structured JSON with vision LLMs, and reconciles the answers of several
//! models:
//! - `pdf`: page text with OCR fallback, page images, single-page splitting
//! - `llm`: prompt templates and the Ollama / Gemini backends
//! - `json`: cleanup and repair of model output, normalization, diffs
//! - `fields`: bilingual field schema
//! - `compare`: generation batches, diff reports, multi-model tables
//! - `verify`: single-field verification and conflict reconciliation

pub mod compare;
pub mod config;
pub mod error;
pub mod fields;
pub mod json;
pub mod llm;
pub mod pdf;
pub mod source;
pub mod verify;

pub use config::{ProviderConfig, ProviderKind};
pub use error::{Error, Result};
pub use llm::{build_provider, DocumentType, VisionProvider};
pub use source::OutputStore;
pub use verify::{verify_conflicts, verify_field, FieldVerification};
