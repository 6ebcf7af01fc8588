//! Extraction batches and compare-only runs

use super::report::{write_diff_reports, write_summaries, DiffReport};
use crate::config::{ProviderKind, DEFAULT_RENDER_DPI};
use crate::error::{Error, Result};
use crate::json::{clean_and_parse_json, diff, is_empty_value, normalize_json_values, Diff};
use crate::llm::{DocumentType, VisionProvider};
use crate::pdf::{
    extract_text, OcrEngine, PageSource, PdfOpener, Rotation, TextOptions, NO_TEXT_PLACEHOLDER,
};
use crate::source::OutputStore;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// What to ask the model about one PDF
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationRequest {
    /// 1-based page to read
    pub page: u32,
    pub doc_type: DocumentType,
    pub rotation: Rotation,
}

/// Structured JSON for one page of one PDF.
///
/// The page image goes to the model together with forced-OCR text of the
/// same page. An empty object or array counts as a failure.
pub async fn generate_single_pdf_output(
    source: &dyn PageSource,
    ocr: &dyn OcrEngine,
    provider: &dyn VisionProvider,
    request: &GenerationRequest,
) -> Result<Value> {
    let image = source.page_image(request.page, DEFAULT_RENDER_DPI, request.rotation)?;

    let text = extract_text(source, ocr, &TextOptions::ocr_context(request.page, &[]));
    let text = if text.trim().is_empty() {
        NO_TEXT_PLACEHOLDER.to_string()
    } else {
        text
    };

    let prompt = request.doc_type.render(&text);
    tracing::debug!(source = source.name(), prompt = %prompt, "full prompt");

    tracing::info!(
        source = source.name(),
        page = request.page,
        provider = provider.name(),
        model = provider.model(),
        "querying model"
    );
    let raw = provider.generate(&prompt, &image).await?;
    tracing::debug!(raw = %raw, "raw model output");

    let data = clean_and_parse_json(&raw)?;
    if is_empty_value(&data) {
        return Err(Error::UnexpectedJson {
            reason: "model returned an empty JSON document".to_string(),
        });
    }
    Ok(data)
}

/// Options of an extraction batch
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub request: GenerationRequest,
    pub overwrite: bool,
    /// Explicit output file, only honoured when there is a single input
    pub output: Option<PathBuf>,
    /// Write `.md` and `.chi.md` next to each JSON output
    pub md_summary: bool,
    /// Model directory to diff new outputs against
    pub compare: Option<String>,
    /// Also write the diff report as Markdown
    pub md_report: bool,
}

/// Counts of an extraction batch
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Present when the batch ran with a compare model
    pub report: Option<DiffReport>,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Summary: {} processed, {} failed, {} skipped.",
            self.processed, self.failed, self.skipped
        )
    }
}

/// Counts of a compare-only run
#[derive(Debug, Default)]
pub struct CompareSummary {
    pub compared: usize,
    pub missing: usize,
    pub report: DiffReport,
}

impl fmt::Display for CompareSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Summary: {} pairs compared, {} pairs skipped due to missing files.",
            self.compared, self.missing
        )
    }
}

fn file_name_of(pdf: &Path) -> String {
    pdf.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| pdf.display().to_string())
}

/// Output written by `compare_model` for `file_name`, if any
fn compare_output_path(
    store: &OutputStore,
    compare_model: &str,
    file_name: &str,
    doc_type: DocumentType,
) -> PathBuf {
    store.output_path(
        compare_model,
        file_name,
        doc_type,
        ProviderKind::infer_from_model_dir(compare_model),
    )
}

fn normalized_diff(old: &Value, new: &Value) -> Option<Diff> {
    diff(&normalize_json_values(old), &normalize_json_values(new))
}

/// Diff a fresh output against the compare model's output for the same file
fn diff_against_compare(
    store: &OutputStore,
    compare_model: &str,
    file_name: &str,
    doc_type: DocumentType,
    new: &Value,
) -> Option<Diff> {
    let path = compare_output_path(store, compare_model, file_name, doc_type);
    if !path.exists() {
        tracing::info!(file = file_name, compare = compare_model, "no output to compare with");
        return None;
    }

    match store.read_json(&path) {
        Ok(old) => {
            let found = normalized_diff(&old, new);
            if found.is_some() {
                tracing::info!(file = file_name, compare = compare_model, "differences found");
            } else {
                tracing::info!(file = file_name, compare = compare_model, "no differences");
            }
            found
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read compare output");
            None
        }
    }
}

async fn generate_for_file(
    pdf: &Path,
    opener: &dyn PdfOpener,
    ocr: &dyn OcrEngine,
    provider: &dyn VisionProvider,
    request: &GenerationRequest,
) -> Result<Value> {
    let source = opener.open(pdf)?;
    generate_single_pdf_output(source.as_ref(), ocr, provider, request).await
}

/// Run the model over every PDF and write one JSON output per file.
///
/// Per-file failures are counted and logged, never returned. Only writing the
/// final diff report can fail the batch.
pub async fn run_generation(
    pdf_files: &[PathBuf],
    store: &OutputStore,
    opener: &dyn PdfOpener,
    ocr: &dyn OcrEngine,
    provider: &dyn VisionProvider,
    options: &ExtractOptions,
) -> Result<BatchSummary> {
    let doc_type = options.request.doc_type;
    let single_output = match (&options.output, pdf_files.len()) {
        (Some(path), 1) => Some(path.clone()),
        (Some(path), _) => {
            tracing::warn!(output = %path.display(), "--output ignored for multiple input files");
            None
        }
        (None, _) => None,
    };

    let mut summary = BatchSummary::default();
    let mut diffs = Vec::new();

    for pdf in pdf_files {
        let file_name = file_name_of(pdf);
        let output_path = single_output.clone().unwrap_or_else(|| {
            store.output_path(provider.model(), &file_name, doc_type, provider.kind())
        });

        if output_path.exists() && !options.overwrite {
            tracing::info!(
                output = %output_path.display(),
                "output exists, skipping (use --overwrite to regenerate)"
            );
            summary.skipped += 1;
            continue;
        }

        tracing::info!(file = %file_name, page = options.request.page, "processing");
        let data = match generate_for_file(pdf, opener, ocr, provider, &options.request).await {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(file = %file_name, error = %e, "failed to generate output");
                summary.failed += 1;
                continue;
            }
        };

        if let Err(e) = store.write_json(&output_path, &data) {
            tracing::error!(output = %output_path.display(), error = %e, "failed to write output");
            summary.failed += 1;
            continue;
        }
        summary.processed += 1;
        tracing::info!(output = %output_path.display(), "output saved");

        if options.md_summary {
            match write_summaries(&data, &output_path) {
                Ok((md, chi)) => {
                    tracing::debug!(md = %md.display(), chi = %chi.display(), "summaries saved")
                }
                Err(e) => tracing::warn!(error = %e, "failed to write markdown summaries"),
            }
        }

        if let Some(compare) = &options.compare {
            if let Some(found) = diff_against_compare(store, compare, &file_name, doc_type, &data) {
                diffs.push((file_name, found));
            }
        }
    }

    if let Some(compare) = &options.compare {
        summary.report = Some(write_diff_reports(
            store,
            provider.model(),
            compare,
            diffs,
            options.md_report,
        )?);
    }

    Ok(summary)
}

/// Diff existing outputs of `current_model` against `compare_model` without querying anything
pub fn run_compare_only(
    pdf_files: &[PathBuf],
    store: &OutputStore,
    current_model: &str,
    current_kind: ProviderKind,
    compare_model: &str,
    doc_type: DocumentType,
    md_report: bool,
) -> Result<CompareSummary> {
    let mut compared = 0;
    let mut missing = 0;
    let mut diffs = Vec::new();

    for pdf in pdf_files {
        let file_name = file_name_of(pdf);
        let current_path = store.output_path(current_model, &file_name, doc_type, current_kind);
        let compare_path = compare_output_path(store, compare_model, &file_name, doc_type);

        if !current_path.exists() || !compare_path.exists() {
            tracing::info!(
                file = %file_name,
                current = %current_path.display(),
                compare = %compare_path.display(),
                "missing output, skipping pair"
            );
            missing += 1;
            continue;
        }

        let pair = store
            .read_json(&current_path)
            .and_then(|new| Ok((store.read_json(&compare_path)?, new)));
        let (old, new) = match pair {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "cannot read outputs, skipping pair");
                missing += 1;
                continue;
            }
        };

        compared += 1;
        if let Some(found) = normalized_diff(&old, &new) {
            tracing::info!(file = %file_name, "differences found");
            diffs.push((file_name, found));
        }
    }

    let report = write_diff_reports(store, current_model, compare_model, diffs, md_report)?;
    Ok(CompareSummary {
        compared,
        missing,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockProvider;
    use crate::pdf::testing::{StubOcr, StubOpener, StubPages};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;

    const ANSWER: &str = r#"```json
{"document_info": {"customs_no": "5316 2024 0001"}, "summary": {"gross_weight_kg": "9.00"}}
```"#;

    fn request() -> GenerationRequest {
        GenerationRequest {
            page: 1,
            doc_type: DocumentType::Declaration,
            rotation: Rotation::NONE,
        }
    }

    fn options() -> ExtractOptions {
        ExtractOptions {
            request: request(),
            overwrite: false,
            output: None,
            md_summary: true,
            compare: None,
            md_report: false,
        }
    }

    fn pdfs(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("/in").join(n)).collect()
    }

    #[tokio::test]
    async fn test_single_output_uses_ocr_text_and_image() {
        let pages = StubPages::new(&["text layer"]);
        let ocr = StubOcr::returning("海关编号 531620240001");
        let provider = MockProvider::answering("m", ANSWER);

        let req = GenerationRequest {
            rotation: Rotation::CLOCKWISE_90,
            ..request()
        };
        let data = generate_single_pdf_output(&pages, &ocr, &provider, &req)
            .await
            .unwrap();
        assert_eq!(data["document_info"]["customs_no"], "5316 2024 0001");

        let prompts = provider.prompts.lock();
        assert!(prompts[0].contains("海关编号 531620240001"));
        // the model sees the rotated render, OCR the upright one
        assert_eq!(provider.images.lock()[0], (20, 40));
        let calls = pages.image_calls.lock();
        assert_eq!(calls[0], (1, DEFAULT_RENDER_DPI, Rotation::CLOCKWISE_90));
        assert_eq!(calls[1], (1, crate::config::OCR_RENDER_DPI, Rotation::NONE));
        assert_eq!(ocr.calls.lock()[0], (40, 20, "chi_tra+eng".to_string()));
    }

    #[tokio::test]
    async fn test_single_output_placeholder_when_no_text() {
        // the stub renders any page, but page 2 has no text to extract
        let pages = StubPages::new(&["only page"]);
        let ocr = StubOcr::returning("text");
        let provider = MockProvider::answering("m", ANSWER);

        let req = GenerationRequest {
            page: 2,
            ..request()
        };
        generate_single_pdf_output(&pages, &ocr, &provider, &req)
            .await
            .unwrap();
        let prompt = provider.prompts.lock()[0].clone();
        assert!(prompt.contains(NO_TEXT_PLACEHOLDER));
        assert!(!prompt.contains("--- Page"));
        assert!(ocr.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_render_failure_skips_model() {
        let pages = StubPages {
            fail_render: true,
            ..StubPages::new(&["x"])
        };
        let ocr = StubOcr::returning("text");
        let provider = MockProvider::answering("m", ANSWER);

        let err = generate_single_pdf_output(&pages, &ocr, &provider, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Pdfium { .. }));
        assert!(provider.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_answer_is_failure() {
        let pages = StubPages::new(&["x"]);
        let ocr = StubOcr::returning("text");
        let provider = MockProvider::answering("m", "Sure! {}");
        let err = generate_single_pdf_output(&pages, &ocr, &provider, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedJson { .. }));
    }

    #[tokio::test]
    async fn test_batch_counts_and_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path());
        let opener = StubOpener::new(&["page"]).without("broken.pdf");
        let ocr = StubOcr::returning("text");
        let provider = MockProvider::answering("qwen3-vl:32b", ANSWER);

        let existing = store.output_path(
            "qwen3-vl:32b",
            "done.pdf",
            DocumentType::Declaration,
            ProviderKind::Ollama,
        );
        store.write_json(&existing, &json!({"old": true})).unwrap();

        let summary = run_generation(
            &pdfs(&["a.pdf", "broken.pdf", "done.pdf"]),
            &store,
            &opener,
            &ocr,
            &provider,
            &options(),
        )
        .await
        .unwrap();

        assert_eq!((summary.processed, summary.failed, summary.skipped), (1, 1, 1));
        assert_eq!(summary.to_string(), "Summary: 1 processed, 1 failed, 1 skipped.");
        assert!(summary.report.is_none());

        let out = dir.path().join("qwen3-vl_32b/a.pdf.declaration.ollama.json");
        assert_eq!(
            store.read_json(&out).unwrap()["summary"]["gross_weight_kg"],
            "9.00"
        );
        assert!(dir.path().join("qwen3-vl_32b/a.pdf.declaration.ollama.md").exists());
        assert!(dir.path().join("qwen3-vl_32b/a.pdf.declaration.ollama.chi.md").exists());
        assert_eq!(store.read_json(&existing).unwrap(), json!({"old": true}));
    }

    #[tokio::test]
    async fn test_batch_overwrite_and_single_output() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path().join("out"));
        let opener = StubOpener::new(&["page"]);
        let ocr = StubOcr::returning("text");
        let provider = MockProvider::answering("m", ANSWER);

        let target = dir.path().join("custom.json");
        fs::write(&target, "{}").unwrap();

        let opts = ExtractOptions {
            overwrite: true,
            output: Some(target.clone()),
            md_summary: false,
            ..options()
        };
        let summary = run_generation(&pdfs(&["a.pdf"]), &store, &opener, &ocr, &provider, &opts)
            .await
            .unwrap();

        assert_eq!(summary.processed, 1);
        let written: Value = serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(written["document_info"]["customs_no"], "5316 2024 0001");
        assert!(!dir.path().join("custom.md").exists());
        assert!(!store.root().exists());
    }

    #[tokio::test]
    async fn test_batch_model_failure_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path());
        let opener = StubOpener::new(&["page"]);
        let ocr = StubOcr::returning("text");
        let provider = MockProvider::new("m", |_| Err("connection refused".to_string()));

        let summary = run_generation(&pdfs(&["a.pdf", "b.pdf"]), &store, &opener, &ocr, &provider, &options())
            .await
            .unwrap();
        assert_eq!((summary.processed, summary.failed, summary.skipped), (0, 2, 0));
    }

    #[tokio::test]
    async fn test_batch_with_compare_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path());
        let opener = StubOpener::new(&["page"]);
        let ocr = StubOcr::returning("text");
        let provider = MockProvider::answering("qwen3-vl:32b", ANSWER);

        // same values after normalization
        store
            .write_json(
                &dir.path().join("gemini-2.5-pro/a.pdf.declaration.gemini.json"),
                &json!({"document_info": {"customs_no": "531620240001"}, "summary": {"gross_weight_kg": 9}}),
            )
            .unwrap();
        store
            .write_json(
                &dir.path().join("gemini-2.5-pro/b.pdf.declaration.gemini.json"),
                &json!({"document_info": {"customs_no": "999"}, "summary": {"gross_weight_kg": 9}}),
            )
            .unwrap();

        let opts = ExtractOptions {
            compare: Some("gemini-2.5-pro".to_string()),
            md_report: true,
            ..options()
        };
        let summary = run_generation(
            &pdfs(&["a.pdf", "b.pdf", "c.pdf"]),
            &store,
            &opener,
            &ocr,
            &provider,
            &opts,
        )
        .await
        .unwrap();

        let report = summary.report.unwrap();
        assert_eq!(report.diffs.len(), 1);
        assert_eq!(report.diffs[0].0, "b.pdf");

        let json_path = report.json_path.unwrap();
        assert_eq!(
            json_path,
            dir.path().join("gemini-2.5-pro/qwen3-vl_32b_vs_gemini-2.5-pro.diff.json")
        );
        let aggregate = store.read_json(&json_path).unwrap();
        assert_eq!(
            aggregate["b.pdf"]["document_info"]["customs_no"],
            json!([999.0, 531620240001.0])
        );
        assert!(report.md_path.unwrap().exists());
    }

    #[test]
    fn test_compare_only_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path());
        let cur = |f: &str| dir.path().join(format!("qwen3-vl_32b/{f}.declaration.ollama.json"));
        let old = |f: &str| dir.path().join(format!("gemini-2.5-pro/{f}.declaration.gemini.json"));

        store.write_json(&cur("a.pdf"), &json!({"x": " 1 "})).unwrap();
        store.write_json(&old("a.pdf"), &json!({"x": 1})).unwrap();
        store.write_json(&cur("b.pdf"), &json!({"x": "A"})).unwrap();
        store.write_json(&old("b.pdf"), &json!({"x": "B"})).unwrap();
        store.write_json(&cur("c.pdf"), &json!({"x": 1})).unwrap();
        fs::create_dir_all(old("d.pdf").parent().unwrap()).unwrap();
        fs::write(cur("d.pdf"), "not json").unwrap();
        fs::write(old("d.pdf"), "{}").unwrap();

        let summary = run_compare_only(
            &pdfs(&["a.pdf", "b.pdf", "c.pdf", "d.pdf"]),
            &store,
            "qwen3-vl:32b",
            ProviderKind::OllamaCli,
            "gemini-2.5-pro",
            DocumentType::Declaration,
            false,
        )
        .unwrap();

        assert_eq!((summary.compared, summary.missing), (2, 2));
        assert_eq!(
            summary.to_string(),
            "Summary: 2 pairs compared, 2 pairs skipped due to missing files."
        );
        assert_eq!(summary.report.diffs.len(), 1);
        assert!(summary.report.md_path.is_none());
    }
}
