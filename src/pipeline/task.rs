//! Generation inputs: templates, options and tasks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Broad family a template belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    #[default]
    Basic,
    Modern,
    Creative,
    Premium,
}

impl TemplateCategory {
    /// Categories whose layouts are expensive enough to send to a worker.
    pub fn is_heavy(&self) -> bool {
        matches!(self, TemplateCategory::Creative | TemplateCategory::Premium)
    }
}

/// A document template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub category: TemplateCategory,
    /// Markup with `{{path}}` placeholders
    pub body: String,
}

fn default_version() -> u32 {
    1
}

impl Template {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: default_version(),
            category: TemplateCategory::default(),
            body: body.into(),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_category(mut self, category: TemplateCategory) -> Self {
        self.category = category;
        self
    }
}

/// Per-call generation options. All fields take part in the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Force (`true`) or forbid (`false`) the worker path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heavy: Option<bool>,
    /// Free-form options passed through to the output metadata
    #[serde(default, flatten)]
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl GenerationOptions {
    pub fn heavy(heavy: bool) -> Self {
        Self {
            heavy: Some(heavy),
            ..Default::default()
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }
}

/// A caller's request: what to render and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub template: Template,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub options: GenerationOptions,
}

/// One unit of work sent to a worker. Lives for a single generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub id: String,
    pub template: Template,
    pub input: serde_json::Value,
    pub options: GenerationOptions,
}
