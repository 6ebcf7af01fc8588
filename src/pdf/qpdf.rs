//! Page copying via qpdf (vendored FFI)

use crate::error::{Error, Result};
use crate::source::resolve_path;
use qpdf::QPdf;
use std::path::Path;

/// Wrapper for qpdf operations via FFI
pub struct QpdfWrapper;

/// Resolve a 1-based page reference: `N`, `z` (last page) or `rN` (N-th from last)
pub fn resolve_page_ref(s: &str, num_pages: u32) -> Result<u32> {
    let s = s.trim();
    if num_pages == 0 {
        return Err(Error::QpdfError {
            reason: "PDF has no pages".to_string(),
        });
    }
    if s == "z" {
        return Ok(num_pages);
    }
    if let Some(r_num) = s.strip_prefix('r') {
        let n: u32 = r_num.parse().map_err(|_| Error::InvalidPageRange {
            range: s.to_string(),
        })?;
        if n == 0 || n > num_pages {
            return Err(Error::PageOutOfBounds {
                page: n,
                total: num_pages,
            });
        }
        return Ok(num_pages - n + 1);
    }
    let page: u32 = s.parse().map_err(|_| Error::InvalidPageRange {
        range: s.to_string(),
    })?;
    if page == 0 || page > num_pages {
        return Err(Error::PageOutOfBounds {
            page,
            total: num_pages,
        });
    }
    Ok(page)
}

fn map_qpdf_error(e: qpdf::QPdfError) -> Error {
    Error::QpdfError {
        reason: e.to_string(),
    }
}

impl QpdfWrapper {
    /// Number of pages in a PDF held in memory
    pub fn page_count(input_data: &[u8]) -> Result<u32> {
        let qpdf = QPdf::read_from_memory(input_data).map_err(map_qpdf_error)?;
        qpdf.get_num_pages().map_err(map_qpdf_error)
    }

    /// Copy the given 1-based pages, in order, into a new PDF
    pub fn copy_pages(input_data: &[u8], pages: &[u32]) -> Result<Vec<u8>> {
        let source = QPdf::read_from_memory(input_data).map_err(map_qpdf_error)?;
        let num_pages = source.get_num_pages().map_err(map_qpdf_error)?;

        let dest = QPdf::empty();

        for &page_num in pages {
            let page = page_num
                .checked_sub(1)
                .and_then(|idx| source.get_page(idx))
                .ok_or(Error::PageOutOfBounds {
                    page: page_num,
                    total: num_pages,
                })?;
            let copied = dest.copy_from_foreign(&page);
            dest.add_page(&copied, false).map_err(map_qpdf_error)?;
        }

        let mut writer = dest.writer();
        writer.preserve_encryption(false);
        writer.write_to_memory().map_err(map_qpdf_error)
    }
}

/// Write page `page` of `input` as a new one-page PDF at `output`.
///
/// Returns the resolved 1-based page number.
pub fn extract_single_page(input: &Path, page: &str, output: &Path) -> Result<u32> {
    let resolved = resolve_path(input)?;
    let num_pages = QpdfWrapper::page_count(&resolved.data)?;
    let page_num = resolve_page_ref(page, num_pages)?;

    let bytes = QpdfWrapper::copy_pages(&resolved.data, &[page_num])?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, bytes)?;

    tracing::info!(
        page = page_num,
        input = %input.display(),
        output = %output.display(),
        "page extracted"
    );
    Ok(page_num)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::testing::minimal_pdf;

    #[test]
    fn test_resolve_numeric_page() {
        assert_eq!(resolve_page_ref("3", 10).unwrap(), 3);
        assert_eq!(resolve_page_ref(" 1 ", 10).unwrap(), 1);
    }

    #[test]
    fn test_resolve_z_reference() {
        assert_eq!(resolve_page_ref("z", 5).unwrap(), 5);
    }

    #[test]
    fn test_resolve_r_reference() {
        assert_eq!(resolve_page_ref("r1", 5).unwrap(), 5);
        assert_eq!(resolve_page_ref("r2", 5).unwrap(), 4);
        assert!(matches!(
            resolve_page_ref("r6", 5),
            Err(Error::PageOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_resolve_invalid_page() {
        assert!(matches!(
            resolve_page_ref("0", 5),
            Err(Error::PageOutOfBounds { page: 0, total: 5 })
        ));
        assert!(matches!(
            resolve_page_ref("11", 10),
            Err(Error::PageOutOfBounds { .. })
        ));
        assert!(matches!(
            resolve_page_ref("abc", 10),
            Err(Error::InvalidPageRange { .. })
        ));
        assert!(resolve_page_ref("1", 0).is_err());
    }

    #[test]
    fn test_copy_pages_and_count() {
        let data = minimal_pdf(3);
        assert_eq!(QpdfWrapper::page_count(&data).unwrap(), 3);

        let out = QpdfWrapper::copy_pages(&data, &[3, 1]).unwrap();
        assert_eq!(QpdfWrapper::page_count(&out).unwrap(), 2);

        assert!(matches!(
            QpdfWrapper::copy_pages(&data, &[4]),
            Err(Error::PageOutOfBounds { page: 4, total: 3 })
        ));
    }

    #[test]
    fn test_extract_single_page_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("nested/out.pdf");
        std::fs::write(&input, minimal_pdf(4)).unwrap();

        let page = extract_single_page(&input, "r2", &output).unwrap();
        assert_eq!(page, 3);

        let written = std::fs::read(&output).unwrap();
        assert!(written.starts_with(b"%PDF"));
        assert_eq!(QpdfWrapper::page_count(&written).unwrap(), 1);
    }

    #[test]
    fn test_extract_single_page_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_single_page(
            &dir.path().join("missing.pdf"),
            "1",
            &dir.path().join("out.pdf"),
        );
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }
}
