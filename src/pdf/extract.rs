//! Page text with OCR fallback

use super::layout::LayoutMode;
use super::ocr::{OcrEngine, Tesseract};
use super::page_image::Rotation;
use super::reader::{PageSource, PdfiumPageSource};
use crate::config::OCR_RENDER_DPI;
use crate::error::{Error, Result};
use std::path::Path;

pub const NO_TEXT_PLACEHOLDER: &str = "(No text extracted)";
pub const OCR_FAILED_PLACEHOLDER: &str = "(OCR Failed)";

/// Preset option sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TextProfile {
    /// Any text layer wins, Simplified Chinese OCR
    #[default]
    Pdf2txt,
    /// Layout-preserving text, OCR below 10 characters, Traditional Chinese OCR
    Cpdf2txt,
}

impl TextProfile {
    pub fn options(self) -> TextOptions {
        match self {
            TextProfile::Pdf2txt => TextOptions {
                pages: None,
                rotate_pages: Vec::new(),
                force_ocr: false,
                lang: "chi_sim+eng".to_string(),
                min_chars: 1,
                layout: LayoutMode::Compact,
            },
            TextProfile::Cpdf2txt => TextOptions {
                pages: None,
                rotate_pages: Vec::new(),
                force_ocr: false,
                lang: "chi_tra+eng".to_string(),
                min_chars: 10,
                layout: LayoutMode::Preserve,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOptions {
    /// 1-based pages in output order, all pages when `None`
    pub pages: Option<Vec<u32>>,
    /// Pages turned 90 degrees clockwise before OCR
    pub rotate_pages: Vec<u32>,
    pub force_ocr: bool,
    /// Tesseract language codes
    pub lang: String,
    /// Fewer non-whitespace characters than this in the text layer triggers OCR
    pub min_chars: usize,
    pub layout: LayoutMode,
}

impl Default for TextOptions {
    fn default() -> Self {
        TextProfile::default().options()
    }
}

impl TextOptions {
    /// Forced-OCR text of one page, used as prompt context
    pub fn ocr_context(page: u32, rotate_pages: &[u32]) -> Self {
        Self {
            pages: Some(vec![page]),
            rotate_pages: rotate_pages.to_vec(),
            force_ocr: true,
            ..TextProfile::Cpdf2txt.options()
        }
    }
}

/// Parse `"1,3-5"` into page numbers.
///
/// Tokens that are not numbers are skipped, a malformed range is an error.
pub fn parse_page_list(spec: &str) -> Result<Vec<u32>> {
    let mut pages = Vec::new();

    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let bad_range = || Error::InvalidPageRange {
                range: part.to_string(),
            };
            let start: u32 = start.trim().parse().map_err(|_| bad_range())?;
            let end: u32 = end.trim().parse().map_err(|_| bad_range())?;
            pages.extend(start..=end);
        } else {
            match part.parse::<u32>() {
                Ok(page) => pages.push(page),
                Err(_) => tracing::warn!(token = part, "ignoring page token that is not a number"),
            }
        }
    }

    Ok(pages)
}

fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Extract the selected pages as `--- Page N ---` sections.
///
/// Page-level failures never abort the document: a failed OCR run yields
/// `(OCR Failed)` for that page.
pub fn extract_text(source: &dyn PageSource, ocr: &dyn OcrEngine, options: &TextOptions) -> String {
    let total = source.page_count();
    let pages: Vec<u32> = match &options.pages {
        Some(list) => list
            .iter()
            .copied()
            .filter(|&p| p >= 1 && p <= total)
            .collect(),
        None => (1..=total).collect(),
    };

    let mut output = String::new();

    for page in pages {
        output.push_str(&format!("--- Page {page} ---\n"));

        let mut text = String::new();
        if !options.force_ocr {
            match source.page_text(page, options.layout) {
                Ok(t) => text = t,
                Err(e) => tracing::warn!(page, error = %e, "text layer unavailable"),
            }
        }

        if options.force_ocr || visible_chars(&text) < options.min_chars {
            if options.force_ocr {
                tracing::info!(page, source = source.name(), "performing OCR as requested");
            } else {
                tracing::info!(page, source = source.name(), "no text layer found, attempting OCR");
            }

            let rotation = if options.rotate_pages.contains(&page) {
                tracing::info!(page, "rotating page 90 degrees clockwise for OCR");
                Rotation::CLOCKWISE_90
            } else {
                Rotation::NONE
            };

            text = match source
                .page_image(page, OCR_RENDER_DPI, rotation)
                .and_then(|image| ocr.recognize(&image, &options.lang))
            {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(page, error = %e, "OCR failed");
                    OCR_FAILED_PLACEHOLDER.to_string()
                }
            };
        }

        if text.trim().is_empty() {
            output.push_str(NO_TEXT_PLACEHOLDER);
        } else {
            output.push_str(&text);
        }
        output.push('\n');
    }

    output
}

/// [`extract_text`] over a PDF file with PDFium and Tesseract
pub fn extract_text_from_pdf(pdf: &Path, options: &TextOptions) -> Result<String> {
    let source = PdfiumPageSource::open(pdf)?;
    Ok(extract_text(&source, &Tesseract::default(), options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::{StubOcr, StubPages};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_text_layer_sections() {
        let pages = StubPages::new(&["Hello", "World"]);
        let ocr = StubOcr::returning("unused");

        let text = extract_text(&pages, &ocr, &TextOptions::default());
        assert_eq!(text, "--- Page 1 ---\nHello\n--- Page 2 ---\nWorld\n");
        assert!(ocr.calls.lock().is_empty());
    }

    #[test]
    fn test_ocr_fallback_below_min_chars() {
        let pages = StubPages::new(&["short", "long enough text layer"]);
        let ocr = StubOcr::returning("报关单 OCR");

        let text = extract_text(&pages, &ocr, &TextProfile::Cpdf2txt.options());
        assert_eq!(
            text,
            "--- Page 1 ---\n报关单 OCR\n--- Page 2 ---\nlong enough text layer\n"
        );

        let calls = ocr.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].2, "chi_tra+eng");
        assert_eq!(pages.image_calls.lock()[0], (1, OCR_RENDER_DPI, Rotation::NONE));
    }

    #[test]
    fn test_forced_ocr_with_rotation() {
        let pages = StubPages::new(&["layer", "layer"]);
        let ocr = StubOcr::returning("upright");
        let options = TextOptions {
            force_ocr: true,
            rotate_pages: vec![2],
            ..TextOptions::default()
        };

        let text = extract_text(&pages, &ocr, &options);
        assert_eq!(text, "--- Page 1 ---\nupright\n--- Page 2 ---\nupright\n");

        let calls = ocr.calls.lock();
        assert_eq!((calls[0].0, calls[0].1), (40, 20));
        assert_eq!((calls[1].0, calls[1].1), (20, 40));
        assert_eq!(pages.image_calls.lock()[1].2, Rotation::CLOCKWISE_90);
    }

    #[test]
    fn test_ocr_failure_placeholder() {
        let pages = StubPages::new(&[""]);
        let text = extract_text(&pages, &StubOcr::failing(), &TextOptions::default());
        assert_eq!(text, "--- Page 1 ---\n(OCR Failed)\n");

        let mut broken = StubPages::new(&[""]);
        broken.fail_render = true;
        let text = extract_text(&broken, &StubOcr::returning("x"), &TextOptions::default());
        assert_eq!(text, "--- Page 1 ---\n(OCR Failed)\n");
    }

    #[test]
    fn test_empty_ocr_placeholder() {
        let pages = StubPages::new(&["  \n"]);
        let text = extract_text(&pages, &StubOcr::returning("\n\n"), &TextOptions::default());
        assert_eq!(text, "--- Page 1 ---\n(No text extracted)\n");
    }

    #[test]
    fn test_out_of_range_pages_dropped() {
        let pages = StubPages::new(&["one", "two"]);
        let options = TextOptions {
            pages: Some(vec![2, 9, 0]),
            ..TextOptions::default()
        };
        let text = extract_text(&pages, &StubOcr::returning(""), &options);
        assert_eq!(text, "--- Page 2 ---\ntwo\n");
    }

    #[test]
    fn test_ocr_context_options() {
        let options = TextOptions::ocr_context(3, &[3]);
        assert_eq!(options.pages, Some(vec![3]));
        assert!(options.force_ocr);
        assert_eq!(options.lang, "chi_tra+eng");
        assert_eq!(options.rotate_pages, vec![3]);
    }

    #[rstest]
    #[case("1,3-5", vec![1, 3, 4, 5])]
    #[case(" 2 , 7 ", vec![2, 7])]
    #[case("1,x,2", vec![1, 2])]
    #[case("", vec![])]
    #[case("5-3", vec![])]
    fn test_parse_page_list(#[case] input: &str, #[case] expected: Vec<u32>) {
        assert_eq!(parse_page_list(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_page_list_bad_range() {
        assert!(matches!(
            parse_page_list("1-a"),
            Err(Error::InvalidPageRange { .. })
        ));
    }
}
