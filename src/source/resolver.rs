//! Input resolution: PDF validation and discovery

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Resolved PDF data
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    pub source_name: String,
}

/// Read a file and check it carries a PDF header
pub fn resolve_path<P: AsRef<Path>>(path: P) -> Result<ResolvedPdf> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path).map_err(Error::Io)?;

    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: format!("{} is not a valid PDF file", path.display()),
        });
    }

    Ok(ResolvedPdf {
        data,
        source_name: path.display().to_string(),
    })
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// PDFs named by `input`: the file itself, or the `*.pdf` files directly inside a directory.
///
/// Directory listings are sorted and may be narrowed with a glob on the file name.
pub fn get_pdf_file_list(input: &Path, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    if input.is_dir() {
        let pattern = pattern
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| Error::InvalidInput {
                reason: format!("bad file pattern: {e}"),
            })?;

        let mut files = Vec::new();
        collect_pdfs(input, pattern.as_ref(), &mut files)?;
        files.sort();
        tracing::info!(count = files.len(), dir = %input.display(), "found PDF files");
        return Ok(files);
    }

    if input.is_file() {
        if !has_pdf_extension(input) {
            return Err(Error::InvalidInput {
                reason: format!("input file must be a PDF, got {}", input.display()),
            });
        }
        return Ok(vec![input.to_path_buf()]);
    }

    Err(Error::InvalidInput {
        reason: format!("input path not found: {}", input.display()),
    })
}

fn collect_pdfs(
    dir: &Path,
    pattern: Option<&glob::Pattern>,
    files: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(Error::Io)?;

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        let path = entry.path();

        if path.is_file() && has_pdf_extension(&path) {
            if let Some(pat) = pattern {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if !pat.matches(&name) {
                    continue;
                }
            }
            files.push(path);
        }
    }

    Ok(())
}

/// Search `dir` recursively for a file called `filename`
pub fn find_pdf_file(dir: &Path, filename: &str) -> Option<PathBuf> {
    let direct = dir.join(filename);
    if direct.is_file() {
        return Some(direct);
    }

    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();

    subdirs
        .iter()
        .find_map(|sub| find_pdf_file(sub, filename))
}
