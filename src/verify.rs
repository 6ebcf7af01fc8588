//! Single-field verification and conflict reconciliation between two models

use crate::compare::{generate_single_pdf_output, GenerationRequest};
use crate::config::DEFAULT_RENDER_DPI;
use crate::error::{Error, Result};
use crate::fields::{document_label, scalar_fields};
use crate::json::{clean_and_parse_json, comparable_text, get_nested_value, to_display_string};
use crate::llm::{render_verify_prompt, VisionProvider};
use crate::pdf::{extract_text, OcrEngine, PageSource, PdfOpener, Rotation, TextOptions};
use crate::source::{find_pdf_file, get_pdf_file_list, sanitize_model_name, OutputStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

const NO_CONTEXT_PLACEHOLDER: &str = "(No text could be extracted)";
const VERIFICATION_FAILED: &str = "Verification Failed";
const NOT_AVAILABLE: &str = "N/A";

/// Model answer for one field, with the request context attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldVerification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<Value>,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Value>,
    /// Field as the caller named it
    pub requested_field_name: String,
    /// Label the model was asked to find on the form
    pub label_on_document: String,
    pub extracted_text_context: String,
    /// Anything else the model returned
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn non_empty_text(value: Option<&Value>) -> Option<String> {
    value
        .filter(|v| !v.is_null())
        .map(to_display_string)
        .filter(|s| !s.trim().is_empty())
}

impl FieldVerification {
    pub fn value_text(&self) -> String {
        non_empty_text(Some(&self.value)).unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    /// `reasoning`, or `explanation` when the model used that key
    pub fn explanation_text(&self) -> String {
        non_empty_text(self.reasoning.as_ref())
            .or_else(|| non_empty_text(self.explanation.as_ref()))
            .unwrap_or_default()
    }
}

/// Ask `provider` to read one field off one page.
///
/// `field` may be a Chinese form label, a dotted English path or a display
/// name. Pages in `rotate_pages` are turned 90 degrees clockwise for both OCR
/// and the model.
pub async fn verify_field(
    source: &dyn PageSource,
    ocr: &dyn OcrEngine,
    provider: &dyn VisionProvider,
    page: u32,
    field: &str,
    rotate_pages: &[u32],
) -> Result<FieldVerification> {
    let total = source.page_count();
    if page < 1 || page > total {
        return Err(Error::PageOutOfBounds { page, total });
    }

    let label = document_label(field);

    tracing::info!(page, source = source.name(), "extracting text context");
    let text = extract_text(source, ocr, &TextOptions::ocr_context(page, rotate_pages));
    let text = if text.trim().is_empty() {
        NO_CONTEXT_PLACEHOLDER.to_string()
    } else {
        text
    };

    let rotation = if rotate_pages.contains(&page) {
        tracing::info!(page, "rotating verification image");
        Rotation::CLOCKWISE_90
    } else {
        Rotation::NONE
    };
    let image = source.page_image(page, DEFAULT_RENDER_DPI, rotation)?;

    let prompt = render_verify_prompt(&label, &text);
    tracing::debug!(prompt = %prompt, "verification prompt");
    tracing::info!(label = %label, model = provider.model(), "verifying field");

    let raw = provider.generate(&prompt, &image).await?;
    let Value::Object(mut answer) = clean_and_parse_json(&raw)? else {
        return Err(Error::UnexpectedJson {
            reason: "verification answer is not a JSON object".to_string(),
        });
    };

    answer.insert("requested_field_name".to_string(), Value::String(field.to_string()));
    answer.insert("label_on_document".to_string(), Value::String(label));
    answer.insert("extracted_text_context".to_string(), Value::String(text));

    Ok(serde_json::from_value(Value::Object(answer))?)
}

/// Options of a conflict reconciliation run
#[derive(Debug, Clone)]
pub struct ConflictOptions {
    /// Source PDFs, searched recursively when locating a file
    pub pdf_dir: PathBuf,
    pub request: GenerationRequest,
    /// Pages rotated for verification
    pub rotate_pages: Vec<u32>,
    pub overwrite_generated: bool,
}

/// The two models being reconciled and the one arbitrating
pub struct ConflictModels<'a> {
    /// Model names or model directory names
    pub model_a: &'a str,
    pub model_b: &'a str,
    /// Providers creating missing outputs of model A and model B. No generation when `None`.
    pub generators: Option<[&'a dyn VisionProvider; 2]>,
    pub verifier: &'a dyn VisionProvider,
}

/// One disagreement and its verification
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRow {
    pub filename: String,
    pub field: String,
    pub value_a: String,
    pub value_b: String,
    pub verified_value: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConflictReport {
    /// Model directory names
    pub model_a: String,
    pub model_b: String,
    pub rows: Vec<ConflictRow>,
    pub generated: usize,
    pub generation_failed: Vec<String>,
    /// Source PDFs lacking either model output
    pub unverified_pdfs: Vec<String>,
    /// Outputs with no source PDF in the directory
    pub orphan_outputs: Vec<String>,
}

impl ConflictReport {
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record([
            "Filename".to_string(),
            "Field".to_string(),
            format!("{} Value", self.model_a),
            format!("{} Value", self.model_b),
            "Verified Value".to_string(),
            "Explanation".to_string(),
        ])?;
        for row in &self.rows {
            csv.write_record([
                &row.filename,
                &row.field,
                &row.value_a,
                &row.value_b,
                &row.verified_value,
                &row.explanation,
            ])?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "| Filename | Field | {} | {} | Verified Value | Explanation |\n|---|---|---|---|---|---|\n",
            self.model_a, self.model_b
        );
        for row in &self.rows {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                row.filename,
                row.field,
                row.value_a,
                row.value_b,
                row.verified_value,
                row.explanation
            ));
        }
        out
    }
}

fn display_or_na(value: Option<&Value>) -> String {
    value
        .filter(|v| !v.is_null())
        .map(to_display_string)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// A non-item field on which the two outputs disagree
#[derive(Debug)]
struct Conflict {
    display_name: &'static str,
    path: String,
    value_a: Option<Value>,
    value_b: Option<Value>,
}

fn find_conflicts(model_a: &str, data_a: &Value, model_b: &str, data_b: &Value) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for (_, field, full_path) in scalar_fields() {
        let (Some(path_a), Some(path_b)) = (
            field.path_for(model_a, &full_path),
            field.path_for(model_b, &full_path),
        ) else {
            // one of the models never produces this field
            continue;
        };

        let value_a = get_nested_value(data_a, path_a);
        let value_b = get_nested_value(data_b, path_b);
        if comparable_text(value_a) != comparable_text(value_b) {
            conflicts.push(Conflict {
                display_name: field.display_name,
                path: full_path.clone(),
                value_a: value_a.cloned(),
                value_b: value_b.cloned(),
            });
        }
    }

    conflicts
}

fn file_name_of(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Create the missing outputs of both models. Returns (generated, failed files).
async fn generate_missing(
    pdf_files: &[PathBuf],
    store: &OutputStore,
    opener: &dyn PdfOpener,
    ocr: &dyn OcrEngine,
    generators: [&dyn VisionProvider; 2],
    options: &ConflictOptions,
) -> (usize, Vec<String>) {
    let mut generated = 0;
    let mut failed: Vec<String> = Vec::new();
    let mut mark_failed = |file: &str| {
        if !failed.iter().any(|f| f == file) {
            failed.push(file.to_string());
        }
    };

    for pdf in pdf_files {
        let file_name = file_name_of(pdf);
        let mut source: Option<Box<dyn PageSource>> = None;

        for provider in generators {
            let output = store.output_path(
                provider.model(),
                &file_name,
                options.request.doc_type,
                provider.kind(),
            );
            if output.exists() && !options.overwrite_generated {
                tracing::info!(file = %file_name, model = provider.model(), "output exists, skipping generation");
                continue;
            }

            if source.is_none() {
                match opener.open(pdf) {
                    Ok(opened) => source = Some(opened),
                    Err(e) => {
                        tracing::error!(file = %file_name, error = %e, "cannot open PDF");
                        mark_failed(&file_name);
                        break;
                    }
                }
            }
            let Some(page_source) = source.as_deref() else {
                break;
            };

            tracing::info!(file = %file_name, model = provider.model(), "generating output");
            let result = match generate_single_pdf_output(page_source, ocr, provider, &options.request).await {
                Ok(data) => store.write_json(&output, &data),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    tracing::info!(output = %output.display(), "output saved");
                    generated += 1;
                }
                Err(e) => {
                    tracing::error!(file = %file_name, model = provider.model(), error = %e, "generation failed");
                    mark_failed(&file_name);
                }
            }
        }
    }

    tracing::info!(generated, failed = failed.len(), "generation phase complete");
    (generated, failed)
}

/// Find fields on which model A and model B disagree and ask the verifier for each.
///
/// Both outputs must exist under `store` (optionally generated first) and the
/// source PDF must be found under `options.pdf_dir`. Only non-item fields are
/// compared.
pub async fn verify_conflicts(
    store: &OutputStore,
    opener: &dyn PdfOpener,
    ocr: &dyn OcrEngine,
    models: &ConflictModels<'_>,
    options: &ConflictOptions,
) -> Result<ConflictReport> {
    let dir_a = sanitize_model_name(models.model_a);
    let dir_b = sanitize_model_name(models.model_b);
    if dir_a == dir_b {
        return Err(Error::Config {
            reason: format!("model A and model B are both '{dir_a}'"),
        });
    }

    let pdf_files = get_pdf_file_list(&options.pdf_dir, None)?;

    let mut report = ConflictReport {
        model_a: dir_a.clone(),
        model_b: dir_b.clone(),
        ..Default::default()
    };

    if let Some(generators) = models.generators {
        let (generated, failed) =
            generate_missing(&pdf_files, store, opener, ocr, generators, options).await;
        report.generated = generated;
        report.generation_failed = failed;
    }

    let discovered = store.discover_processed_files();

    report.unverified_pdfs = pdf_files
        .iter()
        .map(|p| file_name_of(p))
        .filter(|name| {
            discovered
                .get(name)
                .map_or(true, |by_model| {
                    !by_model.contains_key(&dir_a) || !by_model.contains_key(&dir_b)
                })
        })
        .collect();
    if report.unverified_pdfs.is_empty() {
        tracing::info!("all PDFs have outputs from both models");
    } else {
        for pdf in &report.unverified_pdfs {
            tracing::warn!(pdf = %pdf, "missing model output, not verified");
        }
    }

    let pdf_names: BTreeSet<String> = pdf_files.iter().map(|p| file_name_of(p)).collect();
    report.orphan_outputs = discovered
        .keys()
        .filter(|name| !pdf_names.contains(*name))
        .cloned()
        .collect();
    for pdf in &report.orphan_outputs {
        tracing::warn!(pdf = %pdf, "model output without a matching PDF");
    }

    tracing::info!(model_a = %dir_a, model_b = %dir_b, "scanning for conflicts");

    for (pdf_name, by_model) in &discovered {
        let (Some(path_a), Some(path_b)) = (by_model.get(&dir_a), by_model.get(&dir_b)) else {
            continue;
        };

        let Some(pdf_path) = find_pdf_file(&options.pdf_dir, pdf_name) else {
            tracing::warn!(pdf = %pdf_name, dir = %options.pdf_dir.display(), "source PDF not found, skipping");
            continue;
        };

        let (data_a, data_b) = match store
            .read_json(path_a)
            .and_then(|a| Ok((a, store.read_json(path_b)?)))
        {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(pdf = %pdf_name, error = %e, "cannot load model outputs");
                continue;
            }
        };

        let conflicts = find_conflicts(&dir_a, &data_a, &dir_b, &data_b);
        if conflicts.is_empty() {
            continue;
        }

        let source = opener.open(&pdf_path);
        if let Err(e) = &source {
            tracing::error!(pdf = %pdf_name, error = %e, "cannot open source PDF");
        }

        for conflict in conflicts {
            let value_a = display_or_na(conflict.value_a.as_ref());
            let value_b = display_or_na(conflict.value_b.as_ref());
            tracing::info!(
                pdf = %pdf_name,
                field = conflict.display_name,
                a = %value_a,
                b = %value_b,
                "conflict found, verifying"
            );

            let verification = match &source {
                Ok(page_source) => verify_field(
                    page_source.as_ref(),
                    ocr,
                    models.verifier,
                    options.request.page,
                    &conflict.path,
                    &options.rotate_pages,
                )
                .await
                .map_err(|e| {
                    tracing::error!(pdf = %pdf_name, field = conflict.display_name, error = %e, "verification failed");
                    e
                })
                .ok(),
                Err(_) => None,
            };

            let (verified_value, explanation) = match verification {
                Some(v) => (v.value_text(), v.explanation_text()),
                None => (VERIFICATION_FAILED.to_string(), String::new()),
            };

            report.rows.push(ConflictRow {
                filename: pdf_name.clone(),
                field: conflict.display_name.to_string(),
                value_a,
                value_b,
                verified_value,
                explanation,
            });
        }
    }

    Ok(report)
}
