//! Side-by-side field table across every model output under the store root

use crate::error::Result;
use crate::fields::{item_fields, scalar_fields, ITEMS_GROUP};
use crate::json::{get_nested_value, to_display_string};
use crate::source::OutputStore;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::io::Write;

const NOT_AVAILABLE: &str = "N/A";
const FLAT_PLACEHOLDER: &str = "N/A (flat structure)";

/// Table and report rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Md,
    Csv,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// Field group, or `items[i]` for line items
    pub group: String,
    pub field: String,
    /// One cell per model, in [`ComparisonTable::models`] order
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileSection {
    pub pdf: String,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonTable {
    /// Model directory names, sorted
    pub models: Vec<String>,
    pub sections: Vec<FileSection>,
}

fn lookup(data: &Value, path: Option<&str>) -> String {
    path.and_then(|p| get_nested_value(data, p))
        .filter(|v| !v.is_null())
        .map(to_display_string)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Rows for one PDF. `data[i]` is the output of `models[i]` (`{}` when missing).
pub fn build_file_section(pdf: &str, models: &[String], data: &[Value]) -> FileSection {
    let mut rows = Vec::new();

    for (group, field, full_path) in scalar_fields() {
        let values = models
            .iter()
            .zip(data)
            .map(|(model, doc)| lookup(doc, field.path_for(model, &full_path)))
            .collect();
        rows.push(TableRow {
            group: group.name.to_string(),
            field: field.display_name.to_string(),
            values,
        });
    }

    let max_items = data
        .iter()
        .filter_map(|doc| doc.get(ITEMS_GROUP).and_then(Value::as_array))
        .map(Vec::len)
        .max()
        .unwrap_or(0);

    for i in 0..max_items {
        for field in item_fields() {
            let default = format!("{ITEMS_GROUP}.{i}.{}", field.path);
            let values = models
                .iter()
                .zip(data)
                .map(|(model, doc)| {
                    // Models without an items array answer with one flat object
                    let flat = doc.get(ITEMS_GROUP).and_then(Value::as_array).is_none();
                    if flat && i > 0 {
                        return FLAT_PLACEHOLDER.to_string();
                    }
                    match field.override_for(model) {
                        Some(Some(path)) => lookup(doc, Some(path)),
                        _ => lookup(doc, Some(&default)),
                    }
                })
                .collect();
            rows.push(TableRow {
                group: format!("{ITEMS_GROUP}[{i}]"),
                field: field.display_name.to_string(),
                values,
            });
        }
    }

    FileSection {
        pdf: pdf.to_string(),
        rows,
    }
}

/// Table over everything [`OutputStore::discover_processed_files`] finds.
///
/// An unreadable output is logged and shown as all `N/A`.
pub fn build_comparison_table(store: &OutputStore) -> ComparisonTable {
    let discovered = store.discover_processed_files();
    let models: Vec<String> = discovered
        .values()
        .flat_map(|by_model| by_model.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let sections = discovered
        .iter()
        .map(|(pdf, by_model)| {
            let data: Vec<Value> = models
                .iter()
                .map(|model| match by_model.get(model) {
                    Some(path) => store.read_json(path).unwrap_or_else(|e| {
                        tracing::error!(path = %path.display(), error = %e, "cannot read model output");
                        json!({})
                    }),
                    None => json!({}),
                })
                .collect();
            build_file_section(pdf, &models, &data)
        })
        .collect();

    ComparisonTable { models, sections }
}

impl ComparisonTable {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// One `### Comparison for:` section per PDF
    pub fn to_markdown(&self) -> String {
        let header = self.models.join(" | ");
        let separator = vec!["---"; self.models.len()].join(" | ");

        let mut out = String::new();
        for section in &self.sections {
            out.push_str(&format!("\n### Comparison for: {}\n\n", section.pdf));
            out.push_str(&format!("| Field Group | Field | {header} |\n"));
            out.push_str(&format!("|---|---| {separator} |\n"));
            for row in &section.rows {
                out.push_str(&format!(
                    "| **{}** | {} | {} |\n",
                    row.group,
                    row.field,
                    row.values.join(" | ")
                ));
            }
            out.push('\n');
        }
        out
    }

    /// `Filename, Field Group, Field, <models>` rows
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);

        let mut header = vec!["Filename", "Field Group", "Field"];
        header.extend(self.models.iter().map(String::as_str));
        csv.write_record(&header)?;

        for section in &self.sections {
            for row in &section.rows {
                let mut record = vec![section.pdf.as_str(), row.group.as_str(), row.field.as_str()];
                record.extend(row.values.iter().map(String::as_str));
                csv.write_record(&record)?;
            }
        }

        csv.flush()?;
        Ok(())
    }
}
