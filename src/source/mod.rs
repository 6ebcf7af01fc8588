//! Input discovery, page caching and the per-model output store

pub mod cache;
pub mod resolver;
pub mod store;

pub use cache::{CacheManager, CacheWeight};
pub use resolver::{find_pdf_file, get_pdf_file_list, resolve_path, ResolvedPdf};
pub use store::{sanitize_model_name, write_pretty_json, OutputStore, ProcessedFiles};
