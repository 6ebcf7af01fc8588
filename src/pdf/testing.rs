//! Test doubles for the page and OCR seams

use super::layout::LayoutMode;
use super::ocr::OcrEngine;
use super::page_image::{PageImage, Rotation};
use super::reader::{PageSource, PdfOpener};
use crate::error::{Error, Result};
use image::{DynamicImage, RgbImage};
use parking_lot::Mutex;
use std::path::Path;

/// A structurally valid PDF with `pages` empty Letter-size pages
pub(crate) fn minimal_pdf(pages: usize) -> Vec<u8> {
    let kids = (0..pages)
        .map(|i| format!("{} 0 R", i + 3))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{kids}] /Count {pages} >>"),
    ];
    objects.extend(
        (0..pages).map(|_| "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string()),
    );

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

/// Pages with fixed text layers. Images are 40x20 before rotation.
pub(crate) struct StubPages {
    pub texts: Vec<String>,
    pub fail_render: bool,
    pub image_calls: Mutex<Vec<(u32, f32, Rotation)>>,
}

impl StubPages {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            fail_render: false,
            image_calls: Mutex::new(Vec::new()),
        }
    }
}

impl PageSource for StubPages {
    fn name(&self) -> &str {
        "stub.pdf"
    }

    fn page_count(&self) -> u32 {
        self.texts.len() as u32
    }

    fn page_text(&self, page: u32, _mode: LayoutMode) -> Result<String> {
        self.texts
            .get(page.wrapping_sub(1) as usize)
            .cloned()
            .ok_or(Error::PageOutOfBounds {
                page,
                total: self.page_count(),
            })
    }

    fn page_image(&self, page: u32, dpi: f32, rotation: Rotation) -> Result<PageImage> {
        self.image_calls.lock().push((page, dpi, rotation));
        if self.fail_render {
            return Err(Error::Pdfium {
                reason: "render failed".to_string(),
            });
        }
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        PageImage::from_image(&rotation.apply(img))
    }
}

/// OCR returning a fixed answer, or failing when `text` is `None`
pub(crate) struct StubOcr {
    pub text: Option<String>,
    /// (image width, image height, lang) per call
    pub calls: Mutex<Vec<(u32, u32, String)>>,
}

impl StubOcr {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            text: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl OcrEngine for StubOcr {
    fn recognize(&self, image: &PageImage, lang: &str) -> Result<String> {
        self.calls
            .lock()
            .push((image.width, image.height, lang.to_string()));
        self.text.clone().ok_or(Error::Ocr {
            reason: "tesseract exited with 1".to_string(),
        })
    }
}

/// Opens every path as the same [`StubPages`] text, except files named in `missing`
pub(crate) struct StubOpener {
    pub texts: Vec<String>,
    pub missing: Vec<String>,
    pub opened: Mutex<Vec<String>>,
}

impl StubOpener {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            missing: Vec::new(),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn without(mut self, file_name: &str) -> Self {
        self.missing.push(file_name.to_string());
        self
    }
}

impl PdfOpener for StubOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn PageSource>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.opened.lock().push(name.clone());
        if self.missing.contains(&name) {
            return Err(Error::PdfNotFound {
                path: path.display().to_string(),
            });
        }
        let texts: Vec<&str> = self.texts.iter().map(String::as_str).collect();
        Ok(Box::new(StubPages::new(&texts)))
    }
}
