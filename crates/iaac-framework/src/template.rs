//! # Synthesized Template
//!
//! The declarative output of a stack. Resources and outputs live in ordered
//! maps keyed by logical identifier, so serializing the same scope tree always
//! yields the same bytes.

use crate::token::Token;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const FORMAT_VERSION: &str = "2010-09-09";

/// Two renderers claimed the same key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Resource '{0}' is already present in the template")]
    DuplicateResource(String),
    #[error("Output '{0}' is already present in the template")]
    DuplicateOutput(String),
}

/// One entry of the `Resources` section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceEntry {
    #[serde(rename = "Type")]
    pub resource_type: String,
    pub properties: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ResourceEntry {
    pub fn new(resource_type: impl Into<String>, properties: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
            metadata: None,
        }
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// Sets both the deletion and the update-replace policy.
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        let policy = policy.into();
        self.deletion_policy = Some(policy.clone());
        self.update_replace_policy = Some(policy);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// One entry of the `Outputs` section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputEntry {
    pub value: Token,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The synthesized template of a stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: String,
    resources: BTreeMap<String, ResourceEntry>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, OutputEntry>,
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

impl Template {
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn add_resource(
        &mut self,
        id: impl Into<String>,
        entry: ResourceEntry,
    ) -> Result<(), TemplateError> {
        let id = id.into();
        if self.resources.contains_key(&id) {
            return Err(TemplateError::DuplicateResource(id));
        }
        self.resources.insert(id, entry);
        Ok(())
    }

    pub fn add_output(
        &mut self,
        id: impl Into<String>,
        output: OutputEntry,
    ) -> Result<(), TemplateError> {
        let id = id.into();
        if self.outputs.contains_key(&id) {
            return Err(TemplateError::DuplicateOutput(id));
        }
        self.outputs.insert(id, output);
        Ok(())
    }

    pub fn resource(&self, id: &str) -> Option<&ResourceEntry> {
        self.resources.get(id)
    }

    pub fn resources(&self) -> &BTreeMap<String, ResourceEntry> {
        &self.resources
    }

    pub fn output(&self, id: &str) -> Option<&OutputEntry> {
        self.outputs.get(id)
    }

    pub fn outputs(&self) -> &BTreeMap<String, OutputEntry> {
        &self.outputs
    }

    /// Logical ids of every resource of the given type, in key order.
    pub fn ids_of_type(&self, resource_type: &str) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, entry)| entry.resource_type == resource_type)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
