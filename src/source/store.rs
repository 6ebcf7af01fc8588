//! Per-model output store
//!
//! Layout: `<root>/<sanitized model>/<pdf file name>.<doc type>.<suffix>.json`,
//! with `.md` and `.chi.md` summaries next to each JSON file and
//! `<current>_vs_<compare>.diff.{json,md}` reports in the compared model's
//! directory.

use crate::config::ProviderKind;
use crate::error::Result;
use crate::llm::DocumentType;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory name for a model: `:` and `/` become `_`
pub fn sanitize_model_name(model: &str) -> String {
    model.replace([':', '/'], "_")
}

/// `pdf name -> model dir -> output path`, both levels sorted
pub type ProcessedFiles = BTreeMap<String, BTreeMap<String, PathBuf>>;

const DECLARATION_MARKER: &str = ".declaration.";

#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one model's outputs
    pub fn model_dir(&self, model: &str) -> PathBuf {
        self.root.join(sanitize_model_name(model))
    }

    /// Output file for one PDF
    pub fn output_path(
        &self,
        model: &str,
        pdf_file_name: &str,
        doc_type: DocumentType,
        provider: ProviderKind,
    ) -> PathBuf {
        self.model_dir(model).join(format!(
            "{pdf_file_name}.{doc_type}.{}.json",
            provider.file_suffix()
        ))
    }

    /// Write pretty JSON (2-space indent, UTF-8 kept as-is), creating parent directories
    pub fn write_json(&self, path: &Path, value: &Value) -> Result<()> {
        write_pretty_json(path, value)
    }

    pub fn read_json(&self, path: &Path) -> Result<Value> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Paths of the English and Chinese markdown summaries for an output file
    pub fn summary_paths(json_path: &Path) -> (PathBuf, PathBuf) {
        (
            json_path.with_extension("md"),
            json_path.with_extension("chi.md"),
        )
    }

    /// Aggregate diff report paths (`.diff.json`, `.diff.md`), in the compare model's directory
    pub fn diff_report_paths(&self, current_model: &str, compare_model: &str) -> (PathBuf, PathBuf) {
        let stem = format!(
            "{}_vs_{}",
            sanitize_model_name(current_model),
            sanitize_model_name(compare_model)
        );
        let dir = self.model_dir(compare_model);
        (
            dir.join(format!("{stem}.diff.json")),
            dir.join(format!("{stem}.diff.md")),
        )
    }

    /// Every declaration output under the root, keyed by source PDF name then model directory.
    ///
    /// A missing root yields an empty map.
    pub fn discover_processed_files(&self) -> ProcessedFiles {
        let mut discovered = ProcessedFiles::new();

        let models = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(root = %self.root.display(), error = %e, "output directory cannot be read");
                return discovered;
            }
        };

        for model_entry in models.flatten() {
            let model_dir = model_entry.path();
            if !model_dir.is_dir() {
                continue;
            }
            let model_name = model_entry.file_name().to_string_lossy().to_string();

            let files = match std::fs::read_dir(&model_dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dir = %model_dir.display(), error = %e, "skipping unreadable model directory");
                    continue;
                }
            };

            for file_entry in files.flatten() {
                let file_name = file_entry.file_name().to_string_lossy().to_string();
                if !file_name.ends_with(".json") || file_name.ends_with(".diff.json") {
                    continue;
                }
                let Some((pdf_name, _)) = file_name.split_once(DECLARATION_MARKER) else {
                    continue;
                };
                discovered
                    .entry(pdf_name.to_string())
                    .or_default()
                    .insert(model_name.clone(), file_entry.path());
            }
        }

        discovered
    }
}

/// Pretty JSON with 2-space indentation and raw UTF-8
pub fn write_pretty_json(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    std::fs::write(path, text)?;
    Ok(())
}
