//! Input forms.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::plugin::{unsupported_export, ArtifactPlugin, ExportFormat, PluginManifest};
use crate::core::validation::{FieldKind, RequiredFields, StructuralRule, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

use super::escape_html;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    #[default]
    Text,
    Textarea,
    Number,
    Email,
    Date,
    Checkbox,
    Select,
    Radio,
}

impl InputKind {
    /// Kinds that choose from a fixed list of options
    pub fn has_options(&self) -> bool {
        matches!(self, Self::Select | Self::Radio)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: InputKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormContent {
    pub fields: Vec<FormField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_label: Option<String>,
}

impl ContentModel for FormContent {
    const TYPE: ArtifactType = ArtifactType::Form;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        if self.fields.is_empty() {
            return Err(ValidationFailure::new("structure", "form needs at least one field"));
        }

        let mut seen = HashSet::new();
        for (index, field) in self.fields.iter().enumerate() {
            let name = field.name.trim();
            if name.is_empty() {
                return Err(ValidationFailure::new(
                    "structure",
                    format!("field {} has no name", index + 1),
                ));
            }
            if !seen.insert(name) {
                return Err(ValidationFailure::new(
                    "structure",
                    format!("duplicate field name '{}'", name),
                ));
            }
            if field.kind.has_options() && field.options.is_empty() {
                return Err(ValidationFailure::new(
                    "structure",
                    format!("field '{}' needs at least one option", name),
                ));
            }
        }
        Ok(())
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::Form(self)
    }
}

pub struct FormPlugin {
    manifest: PluginManifest,
}

impl FormPlugin {
    pub fn new() -> Self {
        Self {
            manifest: PluginManifest::new("form-plugin", "Form", ArtifactType::Form)
                .with_description("Data entry forms"),
        }
    }
}

impl Default for FormPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn render_field(field: &FormField) -> String {
    let name = escape_html(&field.name);
    let label = if field.label.trim().is_empty() { &field.name } else { &field.label };
    let required = if field.required { " required" } else { "" };
    let placeholder = field
        .placeholder
        .as_deref()
        .map(|p| format!(" placeholder=\"{}\"", escape_html(p)))
        .unwrap_or_default();

    let control = match field.kind {
        InputKind::Textarea => format!("<textarea name=\"{}\"{}{}></textarea>", name, placeholder, required),
        InputKind::Select => {
            let options: String = field
                .options
                .iter()
                .map(|o| format!("<option>{}</option>", escape_html(o)))
                .collect();
            format!("<select name=\"{}\"{}>{}</select>", name, required, options)
        }
        InputKind::Radio => field
            .options
            .iter()
            .map(|o| {
                format!(
                    "<label><input type=\"radio\" name=\"{}\" value=\"{}\"{}> {}</label>",
                    name,
                    escape_html(o),
                    required,
                    escape_html(o)
                )
            })
            .collect::<Vec<_>>()
            .join(" "),
        kind => {
            let input_type = match kind {
                InputKind::Number => "number",
                InputKind::Email => "email",
                InputKind::Date => "date",
                InputKind::Checkbox => "checkbox",
                _ => "text",
            };
            format!(
                "<input type=\"{}\" name=\"{}\"{}{}>",
                input_type, name, placeholder, required
            )
        }
    };

    format!("  <label>{}</label>\n  {}", escape_html(label), control)
}

#[async_trait]
impl ArtifactPlugin for FormPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(FormContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![
            Arc::new(RequiredFields::new(&[("fields", FieldKind::Array)])),
            Arc::new(StructuralRule::<FormContent>::new()),
        ]
    }

    fn schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "required": ["fields"],
            "properties": {
                "fields": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": { "type": "string" },
                            "label": { "type": "string" },
                            "type": {
                                "enum": ["text", "textarea", "number", "email", "date", "checkbox", "select", "radio"]
                            },
                            "required": { "type": "boolean" },
                            "options": { "type": "array", "items": { "type": "string" } },
                            "placeholder": { "type": "string" }
                        }
                    }
                },
                "submit_label": { "type": "string" }
            }
        }))
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Html]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let form = match (&artifact.content, format) {
            (ArtifactContent::Form(form), ExportFormat::Html) => form,
            _ => return Err(unsupported_export(artifact, format)),
        };

        let mut lines = vec!["<form>".to_string()];
        lines.extend(form.fields.iter().map(render_field));
        lines.push(format!(
            "  <button type=\"submit\">{}</button>",
            escape_html(form.submit_label.as_deref().unwrap_or("Submit"))
        ));
        lines.push("</form>".to_string());
        Ok(lines.join("\n") + "\n")
    }
}
