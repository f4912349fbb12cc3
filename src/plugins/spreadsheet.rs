//! Tabular data.
//!
//! The one invariant that matters here is rectangularity: every row carries
//! exactly one cell per column.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::core::plugin::{unsupported_export, ArtifactPlugin, BatchConfig, ExportFormat, PluginManifest};
use crate::core::validation::{FieldKind, RequiredFields, StructuralRule, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadsheetContent {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ContentModel for SpreadsheetContent {
    const TYPE: ArtifactType = ArtifactType::Spreadsheet;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        if self.columns.is_empty() {
            return Err(ValidationFailure::new(
                "structure",
                "spreadsheet needs at least one column",
            ));
        }

        let width = self.columns.len();
        if let Some((index, row)) = self.rows.iter().enumerate().find(|(_, row)| row.len() != width) {
            return Err(ValidationFailure::new(
                "structure",
                format!("row {} has {} cells, expected {}", index + 1, row.len(), width),
            ));
        }
        Ok(())
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Spreadsheet(self)
    }
}

pub struct SpreadsheetPlugin {
    manifest: PluginManifest,
}

impl SpreadsheetPlugin {
    pub fn new() -> Self {
        Self {
            manifest: PluginManifest::new("spreadsheet-plugin", "Spreadsheet", ArtifactType::Spreadsheet)
                .with_description("Rectangular tables of text cells"),
        }
    }
}

impl Default for SpreadsheetPlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// Quote a CSV field when it contains a separator, quote or line break
fn csv_field(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

fn csv_line(cells: &[String]) -> String {
    cells.iter().map(|c| csv_field(c)).collect::<Vec<_>>().join(",")
}

fn markdown_line(cells: &[String]) -> String {
    let cells: Vec<_> = cells.iter().map(|c| c.replace('|', "\\|")).collect();
    format!("| {} |", cells.join(" | "))
}

#[async_trait]
impl ArtifactPlugin for SpreadsheetPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(SpreadsheetContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![
            Arc::new(RequiredFields::new(&[
                ("columns", FieldKind::Array),
                ("rows", FieldKind::Array),
            ])),
            Arc::new(StructuralRule::<SpreadsheetContent>::new()),
        ]
    }

    /// Tidy converted tables: trimmed headers, no trailing all-blank rows
    async fn after_transform(&self, mut payload: Value, source: ArtifactType) -> Result<Value> {
        if let Some(columns) = payload.get_mut("columns").and_then(Value::as_array_mut) {
            for column in columns.iter_mut() {
                if let Some(name) = column.as_str() {
                    *column = Value::String(name.trim().to_string());
                }
            }
        }

        if let Some(rows) = payload.get_mut("rows").and_then(Value::as_array_mut) {
            let before = rows.len();
            while rows.last().map(is_blank_row).unwrap_or(false) {
                rows.pop();
            }
            if rows.len() != before {
                debug!(%source, dropped = before - rows.len(), "Dropped blank trailing rows");
            }
        }

        Ok(payload)
    }

    fn schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "required": ["columns", "rows"],
            "properties": {
                "columns": { "type": "array", "items": { "type": "string" }, "minItems": 1 },
                "rows": {
                    "type": "array",
                    "items": { "type": "array", "items": { "type": "string" } }
                }
            }
        }))
    }

    fn batch_config(&self) -> Option<BatchConfig> {
        Some(BatchConfig {
            max_batch_size: 20,
            concurrency: 4,
        })
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Csv, ExportFormat::Markdown]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let sheet = match &artifact.content {
            ArtifactContent::Spreadsheet(sheet) => sheet,
            _ => return Err(unsupported_export(artifact, format)),
        };

        let mut lines = Vec::with_capacity(sheet.rows.len() + 2);
        match format {
            ExportFormat::Csv => {
                lines.push(csv_line(&sheet.columns));
                lines.extend(sheet.rows.iter().map(|row| csv_line(row)));
            }
            ExportFormat::Markdown => {
                lines.push(markdown_line(&sheet.columns));
                lines.push(format!("|{}", " --- |".repeat(sheet.columns.len())));
                lines.extend(sheet.rows.iter().map(|row| markdown_line(row)));
            }
            other => return Err(unsupported_export(artifact, other)),
        }

        Ok(lines.join("\n") + "\n")
    }
}

fn is_blank_row(row: &Value) -> bool {
    row.as_array()
        .map(|cells| cells.iter().all(|c| c.as_str().map(|s| s.trim().is_empty()).unwrap_or(false)))
        .unwrap_or(false)
}
