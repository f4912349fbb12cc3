//! Type-indexed validation rules.
//!
//! The registry is independent of construction: the same rule set validates
//! caller payloads inside the pipeline and externally sourced payloads (for
//! example a generation-service response) before they are trusted.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::debug;

use crate::domain::{ArtifactType, ContentModel};
use crate::error::{ArtifactError, Result, ValidationFailure};

use super::payload::payload_type;

/// A named predicate over a candidate payload
#[async_trait]
pub trait ValidationRule: Send + Sync {
    /// Short identifier shown alongside failures
    fn name(&self) -> &str;

    /// Reject the payload with a descriptive failure, or accept it
    async fn check(&self, payload: &Value) -> std::result::Result<(), ValidationFailure>;
}

/// Ordered rule lists, one per artifact type
#[derive(Default)]
pub struct ValidationRegistry {
    rules: HashMap<ArtifactType, Vec<Arc<dyn ValidationRule>>>,
}

impl ValidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; registration order is execution order
    pub fn add_rule(&mut self, artifact_type: ArtifactType, rule: Arc<dyn ValidationRule>) {
        debug!(%artifact_type, rule = rule.name(), "Registering validation rule");
        self.rules.entry(artifact_type).or_default().push(rule);
    }

    pub fn rules_for(&self, artifact_type: ArtifactType) -> &[Arc<dyn ValidationRule>] {
        self.rules
            .get(&artifact_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_rules(&self, artifact_type: ArtifactType) -> bool {
        !self.rules_for(artifact_type).is_empty()
    }

    /// Run every rule for a type against the payload.
    ///
    /// Rules run concurrently and all run to completion; every failure is
    /// reported, in registration order.
    pub async fn validate(&self, artifact_type: ArtifactType, payload: &Value) -> Result<()> {
        let rules = self.rules_for(artifact_type);
        if rules.is_empty() {
            return Err(ArtifactError::NoValidationRules { artifact_type });
        }

        let outcomes = join_all(rules.iter().map(|rule| rule.check(payload))).await;
        let failures: Vec<ValidationFailure> =
            outcomes.into_iter().filter_map(|o| o.err()).collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ArtifactError::Validation {
                artifact_type,
                failures,
            })
        }
    }

    /// Validate a payload against the rules of its own `type` tag
    pub async fn validate_payload(&self, payload: &Value) -> Result<ArtifactType> {
        let artifact_type = payload_type(payload)?;
        self.validate(artifact_type, payload).await?;
        Ok(artifact_type)
    }
}

/// Expected JSON kind of a required field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// A string with non-whitespace content
    NonEmptyString,
    Array,
    Object,
    Number,
    Any,
}

impl FieldKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::NonEmptyString => value.as_str().map(|s| !s.trim().is_empty()).unwrap_or(false),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Number => value.is_number(),
            Self::Any => !value.is_null(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::NonEmptyString => "a non-empty string",
            Self::Array => "an array",
            Self::Object => "an object",
            Self::Number => "a number",
            Self::Any => "present",
        }
    }
}

/// Presence and JSON kind of top-level fields
pub struct RequiredFields {
    fields: Vec<(&'static str, FieldKind)>,
}

impl RequiredFields {
    pub fn new(fields: &[(&'static str, FieldKind)]) -> Self {
        Self {
            fields: fields.to_vec(),
        }
    }
}

#[async_trait]
impl ValidationRule for RequiredFields {
    fn name(&self) -> &str {
        "required-fields"
    }

    async fn check(&self, payload: &Value) -> std::result::Result<(), ValidationFailure> {
        let mut missing = Vec::new();
        let mut malformed = Vec::new();

        for (field, kind) in &self.fields {
            match payload.get(*field) {
                None | Some(Value::Null) => missing.push(*field),
                Some(value) if !kind.accepts(value) => {
                    malformed.push(format!("'{}' must be {}", field, kind.describe()))
                }
                Some(_) => {}
            }
        }

        if !missing.is_empty() {
            return Err(ValidationFailure::new(
                self.name(),
                format!("missing required fields: {}", missing.join(", ")),
            ));
        }
        if !malformed.is_empty() {
            return Err(ValidationFailure::new(self.name(), malformed.join(", ")));
        }
        Ok(())
    }
}

/// Parses the payload into a content model and runs its structural checks
pub struct StructuralRule<T> {
    _content: PhantomData<fn() -> T>,
}

impl<T: ContentModel> StructuralRule<T> {
    pub fn new() -> Self {
        Self {
            _content: PhantomData,
        }
    }
}

impl<T: ContentModel> Default for StructuralRule<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: ContentModel> ValidationRule for StructuralRule<T> {
    fn name(&self) -> &str {
        "structure"
    }

    async fn check(&self, payload: &Value) -> std::result::Result<(), ValidationFailure> {
        let content: T = serde_json::from_value(payload.clone()).map_err(|e| {
            ValidationFailure::new(
                self.name(),
                format!("payload does not match the {} shape: {}", T::TYPE, e),
            )
        })?;
        content.validate()
    }
}

type CheckFn = dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync;

/// Rule backed by a synchronous closure
pub struct FnRule {
    name: String,
    check: Box<CheckFn>,
}

impl FnRule {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Box::new(check),
        }
    }
}

#[async_trait]
impl ValidationRule for FnRule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, payload: &Value) -> std::result::Result<(), ValidationFailure> {
        (self.check)(payload).map_err(|message| ValidationFailure::new(&self.name, message))
    }
}
