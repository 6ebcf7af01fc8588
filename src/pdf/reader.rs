//! PDF page access through PDFium

use super::layout::{layout_text, CharInfo, LayoutMode};
use super::page_image::{PageImage, Rotation};
use crate::error::{Error, Result};
use crate::source::{resolve_path, CacheManager};
use pdfium_render::prelude::*;
use std::path::Path;

/// Text and images of the pages of one PDF
pub trait PageSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    fn page_count(&self) -> u32;

    /// Text layer of a 1-based page
    fn page_text(&self, page: u32, mode: LayoutMode) -> Result<String>;

    /// Page rendered at `dpi`, rotated, encoded as JPEG
    fn page_image(&self, page: u32, dpi: f32, rotation: Rotation) -> Result<PageImage>;
}

/// Opens a [`PageSource`] for a file
pub trait PdfOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn PageSource>>;
}

/// Opens files with PDFium
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumOpener;

impl PdfOpener for PdfiumOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn PageSource>> {
        Ok(Box::new(PdfiumPageSource::open(path)?))
    }
}

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
pub fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

fn map_pdfium_error(err: PdfiumError) -> Error {
    Error::Pdfium {
        reason: format!("{}", err),
    }
}

const IMAGE_CACHE_ENTRIES: usize = 16;
const IMAGE_CACHE_BYTES: usize = 256 * 1024 * 1024;
const TEXT_CACHE_ENTRIES: usize = 64;
const TEXT_CACHE_BYTES: usize = 16 * 1024 * 1024;

/// [`PageSource`] backed by PDFium.
///
/// The document bytes are read once. Rendered images and page text are
/// memoized, since verification asks for the same page many times.
pub struct PdfiumPageSource {
    data: Vec<u8>,
    source_name: String,
    page_count: u32,
    images: CacheManager<(u32, u32, Rotation), PageImage>,
    texts: CacheManager<(u32, LayoutMode), String>,
}

impl PdfiumPageSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let resolved = resolve_path(path)?;

        let pdfium = create_pdfium()?;
        let page_count = {
            let document = pdfium
                .load_pdf_from_byte_slice(&resolved.data, None)
                .map_err(map_pdfium_error)?;
            document.pages().len() as u32
        };

        tracing::debug!(source = %resolved.source_name, pages = page_count, "opened PDF");

        Ok(Self {
            data: resolved.data,
            source_name: resolved.source_name,
            page_count,
            images: CacheManager::new(IMAGE_CACHE_ENTRIES, IMAGE_CACHE_BYTES),
            texts: CacheManager::new(TEXT_CACHE_ENTRIES, TEXT_CACHE_BYTES),
        })
    }

    fn check_page(&self, page: u32) -> Result<()> {
        if page < 1 || page > self.page_count {
            return Err(Error::PageOutOfBounds {
                page,
                total: self.page_count,
            });
        }
        Ok(())
    }

    /// Load the document and run `f` on one page
    fn with_page<T>(&self, page: u32, f: impl FnOnce(&PdfPage<'_>) -> Result<T>) -> Result<T> {
        self.check_page(page)?;

        let pdfium = create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&self.data, None)
            .map_err(map_pdfium_error)?;
        let pdf_page = document
            .pages()
            .get((page - 1) as u16)
            .map_err(|e| Error::Pdfium {
                reason: format!("Failed to get page {}: {}", page, e),
            })?;

        f(&pdf_page)
    }

    fn render(&self, page: u32, dpi: f32, rotation: Rotation) -> Result<PageImage> {
        self.with_page(page, |pdf_page| {
            let config = PdfRenderConfig::new()
                .scale_page_by_factor(dpi / 72.0)
                .render_form_data(true)
                .render_annotations(true);

            let bitmap = pdf_page
                .render_with_config(&config)
                .map_err(|e| Error::Pdfium {
                    reason: format!("Failed to render page {}: {}", page, e),
                })?;

            PageImage::from_image(&rotation.apply(bitmap.as_image()))
        })
    }

    fn extract_text(&self, page: u32, mode: LayoutMode) -> Result<String> {
        self.with_page(page, |pdf_page| {
            let text_obj = match pdf_page.text() {
                Ok(t) => t,
                Err(_) => return Ok(String::new()),
            };
            let chars = collect_chars_with_info(&text_obj);
            Ok(layout_text(chars, pdf_page.width().value, mode))
        })
    }
}

impl PageSource for PdfiumPageSource {
    fn name(&self) -> &str {
        &self.source_name
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_text(&self, page: u32, mode: LayoutMode) -> Result<String> {
        self.texts
            .get_or_try_insert((page, mode), || self.extract_text(page, mode))
    }

    fn page_image(&self, page: u32, dpi: f32, rotation: Rotation) -> Result<PageImage> {
        self.images
            .get_or_try_insert((page, dpi.to_bits(), rotation), || {
                self.render(page, dpi, rotation)
            })
    }
}

/// Collect character information from page text
fn collect_chars_with_info(text_obj: &PdfPageText) -> Vec<CharInfo> {
    let mut chars = Vec::new();

    for segment in text_obj.segments().iter() {
        if let Ok(char_iter) = segment.chars() {
            for char_result in char_iter.iter() {
                if let Some(c) = char_result.unicode_char() {
                    if let Ok(bounds) = char_result.loose_bounds() {
                        chars.push(CharInfo {
                            char: c,
                            x: bounds.left().value,
                            y: bounds.top().value,
                            width: bounds.width().value,
                            height: bounds.height().value,
                        });
                    }
                }
            }
        }
    }

    chars
}

/// Number of pages in a PDF file
pub fn page_count(pdf: &Path) -> Result<u32> {
    Ok(PdfiumPageSource::open(pdf)?.page_count())
}

/// Render one 1-based page at `dpi` and rotate it
pub fn render_page_image(pdf: &Path, page: u32, dpi: f32, rotation: Rotation) -> Result<PageImage> {
    PdfiumPageSource::open(pdf)?.page_image(page, dpi, rotation)
}

fn has_jpeg_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

/// Save one page as a JPEG file. `output` must end in `.jpg` or `.jpeg`.
pub fn save_page_as_jpg(pdf: &Path, page: u32, output: &Path, dpi: f32) -> Result<PageImage> {
    if !has_jpeg_extension(output) {
        return Err(Error::InvalidInput {
            reason: format!(
                "output file must have a .jpg or .jpeg extension, got {}",
                output.display()
            ),
        });
    }

    let image = render_page_image(pdf, page, dpi, Rotation::NONE)?;
    image.save(output)?;

    tracing::info!(page, output = %output.display(), "page saved as JPEG");
    Ok(image)
}
