//! Attribute schemas and values
//!
//! Attributes live in a hierarchical dotted namespace (`occi.compute.state`).
//! The schema side is a mapping from a validated dotted path to an
//! [`AttributeDef`] with optional Default, Pattern, Required and Description
//! properties; the value side is a typed map from the same paths to tagged
//! values. Patterns are compiled once and reused across validations.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::errors::{EngineError, EngineResult};

/// A tagged attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// String rendering used for Pattern matching
    pub fn render(&self) -> String {
        match self {
            AttributeValue::Str(s) => s.clone(),
            AttributeValue::Int(i) => i.to_string(),
            AttributeValue::Bool(b) => b.to_string(),
            AttributeValue::Map(_) => String::new(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Str(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Str(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

/// A validation pattern, compiled once on first use
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern {
    source: String,
    #[serde(skip)]
    compiled: OnceLock<Regex>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compiled: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compile the pattern, anchored at both ends
    fn regex(&self) -> EngineResult<&Regex> {
        if let Some(re) = self.compiled.get() {
            return Ok(re);
        }
        let re = Regex::new(&format!("^(?:{})$", self.source)).map_err(|e| {
            EngineError::DuplicateOrInvalidCategory {
                type_identifier: String::new(),
                reason: format!("bad attribute pattern '{}': {e}", self.source),
            }
        })?;
        Ok(self.compiled.get_or_init(|| re))
    }

    pub fn matches(&self, value: &str) -> EngineResult<bool> {
        Ok(self.regex()?.is_match(value))
    }

    /// Force compilation, reporting a bad pattern without matching anything
    pub fn verify(&self) -> EngineResult<()> {
        self.regex().map(|_| ())
    }
}

impl Clone for Pattern {
    fn clone(&self) -> Self {
        Self::new(self.source.clone())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

/// Definition of a single attribute in a Kind/Mixin/Action schema
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeDef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<AttributeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AttributeDef {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    pub fn with_default(value: impl Into<AttributeValue>) -> Self {
        Self {
            default: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(Pattern::new(pattern));
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Attribute schema: validated dotted path → definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSchema {
    defs: BTreeMap<String, AttributeDef>,
}

/// Dotted paths are non-empty `[A-Za-z0-9_]` segments joined by single dots
pub fn valid_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|seg| {
            !seg.is_empty()
                && seg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

impl AttributeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, path: &str, def: AttributeDef) -> EngineResult<()> {
        if !valid_path(path) {
            return Err(EngineError::SchemaValidation {
                attribute: path.to_string(),
                reason: "invalid dotted path".to_string(),
            });
        }
        self.defs.insert(path.to_string(), def);
        Ok(())
    }

    /// Builder-style define, panics on an invalid path; used for the
    /// statically known built-in model where paths are literals.
    pub fn with(mut self, path: &str, def: AttributeDef) -> Self {
        self.defs.insert(path.to_string(), def);
        debug_assert!(valid_path(path), "invalid attribute path {path}");
        self
    }

    pub fn get(&self, path: &str) -> Option<&AttributeDef> {
        self.defs.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeDef)> {
        self.defs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Merge another schema in; later definitions win, matching how Mixin
    /// schemas layer over the Kind schema.
    pub fn merge(&mut self, other: &AttributeSchema) {
        for (path, def) in &other.defs {
            self.defs.insert(path.clone(), def.clone());
        }
    }
}

/// Attribute values keyed by dotted path
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap {
    values: BTreeMap<String, AttributeValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: &str, value: impl Into<AttributeValue>) -> EngineResult<()> {
        if !valid_path(path) {
            return Err(EngineError::SchemaValidation {
                attribute: path.to_string(),
                reason: "invalid dotted path".to_string(),
            });
        }
        self.values.insert(path.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&AttributeValue> {
        self.values.get(path)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(AttributeValue::as_str)
    }

    pub fn remove(&mut self, path: &str) -> Option<AttributeValue> {
        self.values.remove(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Validate against a merged schema
    ///
    /// Missing attributes with a Default are filled in; missing Required
    /// attributes without a Default fail. Present values are checked against
    /// the definition's Pattern via their string rendering.
    pub fn validate(&mut self, schema: &AttributeSchema) -> EngineResult<()> {
        for (path, def) in schema.iter() {
            match self.values.get(path) {
                Some(value) => {
                    if let Some(pattern) = &def.pattern {
                        if !pattern.matches(&value.render())? {
                            return Err(EngineError::SchemaValidation {
                                attribute: path.to_string(),
                                reason: format!(
                                    "value '{}' does not match pattern '{}'",
                                    value.render(),
                                    pattern.source()
                                ),
                            });
                        }
                    }
                }
                None => {
                    if let Some(default) = &def.default {
                        self.values.insert(path.to_string(), default.clone());
                    } else if def.required {
                        return Err(EngineError::SchemaValidation {
                            attribute: path.to_string(),
                            reason: "required attribute missing".to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
