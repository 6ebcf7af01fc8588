//! Multi-model extraction and comparison
//!
//! Each model's answers live in their own directory of the [`OutputStore`].
//! A batch writes one JSON file per PDF and can diff it against another
//! model's output for the same file. The comparison table lines up every
//! model side by side, field by field.
//!
//! [`OutputStore`]: crate::source::OutputStore

mod generate;
mod report;
mod table;

pub use generate::{
    generate_single_pdf_output, run_compare_only, run_generation, BatchSummary, CompareSummary,
    ExtractOptions, GenerationRequest,
};
pub use report::{diff_markdown, summary_markdown, write_diff_reports, write_summaries, DiffReport};
pub use table::{
    build_comparison_table, build_file_section, ComparisonTable, FileSection, ReportFormat,
    TableRow,
};
