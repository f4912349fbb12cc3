//! Described HTTP calls.
//!
//! The artifact is a description of a request, never executed here. Its
//! interesting invariant is the auth descriptor: each kind carries exactly
//! its own fields, so a bearer descriptor with a stray `password` is invalid
//! rather than silently ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::plugin::{unsupported_export, ArtifactPlugin, ExportFormat, PluginManifest};
use crate::core::validation::{FieldKind, FnRule, RequiredFields, StructuralRule, ValidationRule};
use crate::domain::{Artifact, ArtifactContent, ArtifactType, ContentModel};
use crate::error::{Result, ValidationFailure};

use super::require_text;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        };
        f.write_str(method)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyPlacement {
    Header,
    Query,
}

/// Credentials attached to the call, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthDescriptor {
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    ApiKey {
        key: String,
        value: String,
        placement: ApiKeyPlacement,
    },
}

impl AuthDescriptor {
    /// Fields a descriptor of `kind` carries besides `kind` itself
    pub fn fields_for(kind: &str) -> Option<&'static [&'static str]> {
        match kind {
            "bearer" => Some(&["token"]),
            "basic" => Some(&["username", "password"]),
            "api_key" => Some(&["key", "value", "placement"]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteCallContent {
    pub method: HttpMethod,
    pub url: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthDescriptor>,
}

impl ContentModel for RemoteCallContent {
    const TYPE: ArtifactType = ArtifactType::RemoteCall;

    fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        require_text("structure", "url", &self.url)?;

        let rest = self
            .url
            .strip_prefix("https://")
            .or_else(|| self.url.strip_prefix("http://"));
        match rest {
            Some(rest) if !rest.is_empty() && !rest.starts_with('/') => {}
            _ => {
                return Err(ValidationFailure::new(
                    "structure",
                    format!("'{}' is not an http(s) url", self.url),
                ))
            }
        }

        match &self.auth {
            Some(AuthDescriptor::Bearer { token }) => require_text("structure", "auth.token", token),
            Some(AuthDescriptor::Basic { username, .. }) => {
                require_text("structure", "auth.username", username)
            }
            Some(AuthDescriptor::ApiKey { key, .. }) => require_text("structure", "auth.key", key),
            None => Ok(()),
        }
    }

    fn into_content(self) -> ArtifactContent {
        ArtifactContent::RemoteCall(self)
    }
}

/// Auth objects must carry exactly the fields of their kind
fn check_auth_shape(payload: &Value) -> std::result::Result<(), String> {
    let auth = match payload.get("auth") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Object(auth)) => auth,
        Some(_) => return Err("'auth' must be an object".to_string()),
    };

    let kind = auth
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| "auth descriptor has no 'kind'".to_string())?;
    let expected = AuthDescriptor::fields_for(kind)
        .ok_or_else(|| format!("unknown auth kind '{}'", kind))?;

    let missing: Vec<_> = expected
        .iter()
        .filter(|field| auth.get(**field).map(Value::is_null).unwrap_or(true))
        .copied()
        .collect();
    let unexpected: Vec<_> = auth
        .keys()
        .filter(|key| key.as_str() != "kind" && !expected.contains(&key.as_str()))
        .map(String::as_str)
        .collect();

    if !missing.is_empty() {
        return Err(format!("{} auth is missing: {}", kind, missing.join(", ")));
    }
    if !unexpected.is_empty() {
        return Err(format!("{} auth does not take: {}", kind, unexpected.join(", ")));
    }
    Ok(())
}

/// Quote for a POSIX shell
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

pub struct RemoteCallPlugin {
    manifest: PluginManifest,
}

impl RemoteCallPlugin {
    pub fn new() -> Self {
        Self {
            manifest: PluginManifest::new("remote-call-plugin", "Remote call", ArtifactType::RemoteCall)
                .with_description("HTTP requests with optional credentials"),
        }
    }
}

impl Default for RemoteCallPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactPlugin for RemoteCallPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn create_instance(&self) -> Artifact {
        Artifact::new(RemoteCallContent::default().into_content())
    }

    fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
        vec![
            Arc::new(RequiredFields::new(&[
                ("method", FieldKind::NonEmptyString),
                ("url", FieldKind::NonEmptyString),
            ])),
            Arc::new(FnRule::new("auth-shape", check_auth_shape)),
            Arc::new(StructuralRule::<RemoteCallContent>::new()),
        ]
    }

    fn schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "required": ["method", "url"],
            "properties": {
                "method": { "enum": ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"] },
                "url": { "type": "string", "pattern": "^https?://" },
                "headers": { "type": "object", "additionalProperties": { "type": "string" } },
                "body": {},
                "auth": {
                    "oneOf": [
                        {
                            "type": "object",
                            "properties": { "kind": { "const": "bearer" }, "token": { "type": "string" } },
                            "required": ["kind", "token"],
                            "additionalProperties": false
                        },
                        {
                            "type": "object",
                            "properties": {
                                "kind": { "const": "basic" },
                                "username": { "type": "string" },
                                "password": { "type": "string" }
                            },
                            "required": ["kind", "username", "password"],
                            "additionalProperties": false
                        },
                        {
                            "type": "object",
                            "properties": {
                                "kind": { "const": "api_key" },
                                "key": { "type": "string" },
                                "value": { "type": "string" },
                                "placement": { "enum": ["header", "query"] }
                            },
                            "required": ["kind", "key", "value", "placement"],
                            "additionalProperties": false
                        }
                    ]
                }
            }
        }))
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Curl]
    }

    fn export(&self, artifact: &Artifact, format: ExportFormat) -> Result<String> {
        let call = match (&artifact.content, format) {
            (ArtifactContent::RemoteCall(call), ExportFormat::Curl) => call,
            _ => return Err(unsupported_export(artifact, format)),
        };

        let mut url = call.url.clone();
        let mut parts = vec!["curl".to_string(), "-X".to_string(), call.method.to_string()];

        for (name, value) in &call.headers {
            parts.push("-H".to_string());
            parts.push(shell_quote(&format!("{}: {}", name, value)));
        }

        match &call.auth {
            Some(AuthDescriptor::Bearer { token }) => {
                parts.push("-H".to_string());
                parts.push(shell_quote(&format!("Authorization: Bearer {}", token)));
            }
            Some(AuthDescriptor::Basic { username, password }) => {
                parts.push("-u".to_string());
                parts.push(shell_quote(&format!("{}:{}", username, password)));
            }
            Some(AuthDescriptor::ApiKey {
                key,
                value,
                placement: ApiKeyPlacement::Header,
            }) => {
                parts.push("-H".to_string());
                parts.push(shell_quote(&format!("{}: {}", key, value)));
            }
            Some(AuthDescriptor::ApiKey {
                key,
                value,
                placement: ApiKeyPlacement::Query,
            }) => {
                let separator = if url.contains('?') { '&' } else { '?' };
                url = format!("{}{}{}={}", url, separator, key, value);
            }
            None => {}
        }

        match &call.body {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => {
                parts.push("--data".to_string());
                parts.push(shell_quote(text));
            }
            Some(body) => {
                parts.push("-H".to_string());
                parts.push(shell_quote("Content-Type: application/json"));
                parts.push("--data".to_string());
                parts.push(shell_quote(&body.to_string()));
            }
        }

        parts.push(shell_quote(&url));
        Ok(parts.join(" ") + "\n")
    }
}
