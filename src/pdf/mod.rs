//! PDF processing layer
//!
//! Page text and images come from PDFium, OCR from the Tesseract CLI and page
//! copying from qpdf. The pipeline only sees the [`PageSource`] and
//! [`OcrEngine`] traits.

mod extract;
mod layout;
mod ocr;
mod page_image;
mod qpdf;
mod reader;

#[cfg(test)]
pub(crate) mod testing;

pub use extract::{
    extract_text, extract_text_from_pdf, parse_page_list, TextOptions, TextProfile,
    NO_TEXT_PLACEHOLDER, OCR_FAILED_PLACEHOLDER,
};
pub use layout::{layout_text, CharInfo, LayoutMode, LineInfo};
pub use ocr::{OcrEngine, Tesseract};
pub use page_image::{PageImage, Rotation};
pub use qpdf::{extract_single_page, resolve_page_ref, QpdfWrapper};
pub use reader::{
    create_pdfium, page_count, render_page_image, save_page_as_jpg, PageSource, PdfOpener,
    PdfiumOpener, PdfiumPageSource,
};
