//! Markdown summaries of single outputs and aggregate diff reports

use crate::error::Result;
use crate::fields::{item_fields, label_for_path, scalar_fields, ITEMS_GROUP};
use crate::json::{get_nested_value, to_compact_string, Diff};
use crate::source::{sanitize_model_name, write_pretty_json, OutputStore};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const NOT_AVAILABLE: &str = "N/A";

fn cell(value: Option<&Value>) -> String {
    match value {
        Some(v) if !v.is_null() => to_compact_string(v),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// English and Chinese `Field | Value` tables for one output.
///
/// Non-item fields come first in table order, then one block per line item.
pub fn summary_markdown(data: &Value) -> (String, String) {
    let mut en = vec!["| Field | Value |".to_string(), "|---|---|".to_string()];
    let mut zh = vec!["| 字段 | 数值 |".to_string(), "|---|---|".to_string()];

    for (_, field, full_path) in scalar_fields() {
        let value = cell(get_nested_value(data, &full_path));
        let label = label_for_path(&full_path).unwrap_or(field.display_name);
        en.push(format!("| {} | {value} |", field.display_name));
        zh.push(format!("| {label} | {value} |"));
    }

    if let Some(items) = data.get(ITEMS_GROUP).and_then(Value::as_array) {
        for (i, item) in items.iter().enumerate() {
            en.push(format!("| **--- Item {} ---** | --- |", i + 1));
            zh.push(format!("| **--- 项目 {} ---** | --- |", i + 1));

            for field in item_fields() {
                let value = cell(get_nested_value(item, field.path));
                let label = label_for_path(&format!("{ITEMS_GROUP}.{}", field.path))
                    .unwrap_or(field.display_name);
                en.push(format!("| {} | {value} |", field.display_name));
                zh.push(format!("| {label} | {value} |"));
            }
        }
    }

    (en.join("\n"), zh.join("\n"))
}

/// Write `.md` and `.chi.md` next to `json_path`
pub fn write_summaries(data: &Value, json_path: &Path) -> Result<(PathBuf, PathBuf)> {
    let (en, zh) = summary_markdown(data);
    let (md_path, chi_path) = OutputStore::summary_paths(json_path);
    std::fs::write(&md_path, en)?;
    std::fs::write(&chi_path, zh)?;
    Ok((md_path, chi_path))
}

/// Markdown rendering of per-file diffs, old side from `compare_model`
pub fn diff_markdown(current_model: &str, compare_model: &str, diffs: &[(String, Diff)]) -> String {
    let current = sanitize_model_name(current_model);
    let compare = sanitize_model_name(compare_model);
    let side = |value: &Option<Value>| {
        value
            .as_ref()
            .map(to_compact_string)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };

    let mut out = format!("# Comparison Report: {current} vs. {compare}\n\n");
    for (file, found) in diffs {
        out.push_str(&format!("## Differences for: `{file}`\n\n"));
        out.push_str(&format!(
            "| Field | `{compare}` (Old) | `{current}` (New) |\n|---|---|---|\n"
        ));
        for row in found.flatten() {
            out.push_str(&format!(
                "| `{}` | {} | {} |\n",
                row.field,
                side(&row.old),
                side(&row.new)
            ));
        }
        out.push('\n');
    }
    out
}

/// Result of a comparison run
#[derive(Debug, Clone, Default)]
pub struct DiffReport {
    /// Files that differ, in processing order
    pub diffs: Vec<(String, Diff)>,
    pub json_path: Option<PathBuf>,
    pub md_path: Option<PathBuf>,
}

const BANNER_WIDTH: usize = 70;

impl DiffReport {
    /// Closing banner printed after a comparison run
    pub fn banner(&self) -> String {
        let rule = "#".repeat(BANNER_WIDTH);
        let mut lines = vec![
            rule.clone(),
            format!("###{:^64}###", " FINAL COMPARISON REPORT"),
            rule.clone(),
        ];

        if self.diffs.is_empty() {
            lines.push("> No differences were detected across any of the compared files.".to_string());
            lines.push("> Therefore, no diff file was generated.".to_string());
        } else {
            lines.push(format!("> Found differences in {} file(s).", self.diffs.len()));
            if let Some(path) = &self.json_path {
                lines.push(format!("> Aggregated diff saved to: {}", path.display()));
            }
            if let Some(path) = &self.md_path {
                lines.push(format!("> Markdown report saved to: {}", path.display()));
            }
        }

        lines.push(rule);
        lines.join("\n")
    }
}

/// Write the aggregate `{file: diff}` JSON, plus Markdown when asked.
///
/// Nothing is written when there are no differences.
pub fn write_diff_reports(
    store: &OutputStore,
    current_model: &str,
    compare_model: &str,
    diffs: Vec<(String, Diff)>,
    markdown: bool,
) -> Result<DiffReport> {
    if diffs.is_empty() {
        return Ok(DiffReport::default());
    }

    let (json_path, md_path) = store.diff_report_paths(current_model, compare_model);

    let aggregate: Map<String, Value> = diffs
        .iter()
        .map(|(file, found)| (file.clone(), found.to_json()))
        .collect();
    write_pretty_json(&json_path, &Value::Object(aggregate))?;
    tracing::info!(path = %json_path.display(), files = diffs.len(), "diff report saved");

    let md_path = if markdown {
        std::fs::write(&md_path, diff_markdown(current_model, compare_model, &diffs))?;
        tracing::info!(path = %md_path.display(), "markdown diff report saved");
        Some(md_path)
    } else {
        None
    };

    Ok(DiffReport {
        diffs,
        json_path: Some(json_path),
        md_path,
    })
}
