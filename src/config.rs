//! YAML Configuration File Support for the payload engine
//!
//! This module loads entity definitions from YAML files: the attributes each
//! entity persists, which payload key identifies a document, which payload
//! key paths feed which attributes, and the default ingest options. From a
//! loaded [`EntityConfig`] you get a ready [`PayloadMap`], [`PayloadIngester`],
//! and [`IngestOptions`].
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! # Payload engine configuration
//! version: "1.0"
//! name: "crm"
//!
//! entities:
//!   - name: Person
//!     identity:
//!       key: id
//!       attribute: id
//!       transforms: [trim_strings]
//!     attributes:
//!       - { name: id, kind: string }
//!       - { name: name, kind: string, optional: true }
//!       - { name: age, kind: integer32, optional: true }
//!       - { name: active, kind: boolean, default: true }
//!       - { name: joined, kind: date, optional: true, transforms: [parse_rfc3339_date] }
//!     mappings:
//!       "profile.age": age
//!     ingest:
//!       ordered: true
//!       prefetch: [friends]
//!       scope: { tenant: "acme" }
//! ```
//!
//! Every attribute except the identity attribute is mapped under its own name
//! unless `default_mappings: false` is set; `mappings` adds further key paths.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use ingest::{IngestOptions, PayloadIngester};
use mapping::{coerce, AttributeSchema, PayloadMap, ScalarKind, TransformChain, ValueTransform};
use serde::{Deserialize, Serialize};
use store::{AttributeValue, Context, PayloadValue};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Top-level YAML configuration: a set of entity definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

impl EngineConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        let mut seen = BTreeSet::new();
        for entity in &self.entities {
            if !seen.insert(entity.name.as_str()) {
                return Err(ConfigLoadError::Validation(format!(
                    "entity `{}` is defined more than once",
                    entity.name
                )));
            }
            entity.validate()?;
        }
        Ok(())
    }

    pub fn entity(&self, name: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|entity| entity.name == name)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            entities: Vec::new(),
        }
    }
}

/// One persisted entity type and how payloads map onto it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Entity name records are fetched and created under
    pub name: String,

    pub identity: IdentityYamlConfig,

    #[serde(default)]
    pub attributes: Vec<AttributeYamlConfig>,

    /// Map every non-identity attribute under its own name
    #[serde(default = "true_value")]
    pub default_mappings: bool,

    /// Extra payload key paths, each naming its target attribute
    #[serde(default)]
    pub mappings: BTreeMap<String, String>,

    #[serde(default)]
    pub ingest: IngestYamlConfig,
}

impl EntityConfig {
    pub fn attribute(&self, name: &str) -> Option<&AttributeYamlConfig> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    /// Typed schema of a declared attribute, default value coerced to its kind
    pub fn schema(&self, name: &str) -> Result<AttributeSchema, ConfigLoadError> {
        let Some(attribute) = self.attribute(name) else {
            return Err(ConfigLoadError::MissingField(format!(
                "entities.{}.attributes.{name}",
                self.name
            )));
        };
        attribute.schema().map_err(|msg| {
            ConfigLoadError::Validation(format!("entity `{}`: {msg}", self.name))
        })
    }

    /// Payload map: identity, then default mappings, then explicit mappings
    pub fn payload_map<C: Context>(&self) -> Result<PayloadMap<C>, ConfigLoadError> {
        self.validate()?;

        let identity = self.schema(&self.identity.attribute)?;
        let mut builder = PayloadMap::identified_by_with(
            &self.identity.key,
            transform_chain(&self.identity.transforms),
            identity,
        );

        if self.default_mappings {
            for attribute in &self.attributes {
                if self.is_identity(&attribute.name) {
                    continue;
                }
                builder = builder.attribute_with(
                    &attribute.name,
                    transform_chain(&attribute.transforms),
                    self.schema(&attribute.name)?,
                );
            }
        }

        for (path, target) in &self.mappings {
            let transforms = self
                .attribute(target)
                .map(|attribute| transform_chain(&attribute.transforms))
                .unwrap_or_default();
            builder = builder.attribute_with(path, transforms, self.schema(target)?);
        }

        Ok(builder.build())
    }

    pub fn ingester<C: Context + 'static>(&self) -> Result<PayloadIngester<C>, ConfigLoadError> {
        Ok(PayloadIngester::new(self.name.clone(), self.payload_map()?))
    }

    /// Default ingest options; scope values are coerced to their attribute kinds
    pub fn options(&self) -> Result<IngestOptions, ConfigLoadError> {
        let mut options = IngestOptions::default()
            .ordered(self.ingest.ordered)
            .stamp_scope(self.ingest.stamp_scope);
        for path in &self.ingest.prefetch {
            options = options.prefetching(path.clone());
        }
        for (name, value) in &self.ingest.scope {
            let schema = self.schema(name)?;
            let Some(value) = coerce(&PayloadValue::from(value.clone()), schema.kind) else {
                return Err(ConfigLoadError::Validation(format!(
                    "entity `{}`: scope value for `{name}` is not a valid {}",
                    self.name,
                    schema.kind.as_str()
                )));
            };
            options = options.scoped(name.clone(), value);
        }
        Ok(options)
    }

    fn is_identity(&self, attribute: &str) -> bool {
        attribute == self.identity.attribute || attribute == self.identity.key
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        let entity = &self.name;
        if entity.is_empty() {
            return Err(ConfigLoadError::MissingField("entities.name".to_string()));
        }

        let mut names = BTreeSet::new();
        for attribute in &self.attributes {
            if attribute.name.is_empty() || attribute.name.contains('.') {
                return Err(ConfigLoadError::Validation(format!(
                    "entity `{entity}`: attribute name `{}` must be a single non-empty key",
                    attribute.name
                )));
            }
            if !names.insert(attribute.name.as_str()) {
                return Err(ConfigLoadError::Validation(format!(
                    "entity `{entity}`: attribute `{}` is declared more than once",
                    attribute.name
                )));
            }
            self.schema(&attribute.name)?;
        }

        let key = self.identity.key.as_str();
        if key.is_empty() || key.contains('.') {
            return Err(ConfigLoadError::Validation(format!(
                "entity `{entity}`: identity key `{key}` must be a single non-empty key"
            )));
        }
        if self.attribute(&self.identity.attribute).is_none() {
            return Err(ConfigLoadError::Validation(format!(
                "entity `{entity}`: identity attribute `{}` is not declared",
                self.identity.attribute
            )));
        }

        let mut paths: Vec<Vec<&str>> = Vec::new();
        if self.default_mappings {
            paths.extend(
                self.attributes
                    .iter()
                    .filter(|attribute| !self.is_identity(&attribute.name))
                    .map(|attribute| vec![attribute.name.as_str()]),
            );
        }
        for (path, target) in &self.mappings {
            let components: Vec<&str> = path.split('.').collect();
            if components.iter().any(|component| component.is_empty()) {
                return Err(ConfigLoadError::Validation(format!(
                    "entity `{entity}`: invalid mapping path `{path}`"
                )));
            }
            if components[0] == key {
                return Err(ConfigLoadError::Validation(format!(
                    "entity `{entity}`: mapping path `{path}` collides with identity key `{key}`"
                )));
            }
            if self.attribute(target).is_none() {
                return Err(ConfigLoadError::Validation(format!(
                    "entity `{entity}`: mapping `{path}` targets undeclared attribute `{target}`"
                )));
            }
            paths.push(components);
        }

        for (i, a) in paths.iter().enumerate() {
            for b in &paths[i + 1..] {
                let shared = a.len().min(b.len());
                if a.len() != b.len() && a[..shared] == b[..shared] {
                    return Err(ConfigLoadError::Validation(format!(
                        "entity `{entity}`: `{}` and `{}` cannot both be mapped; one nests under the other",
                        a.join("."),
                        b.join(".")
                    )));
                }
            }
        }

        self.options().map(|_| ())
    }
}

/// Identity key and attribute of an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityYamlConfig {
    /// Payload key holding the identity
    pub key: String,

    /// Attribute the identity is stored in
    pub attribute: String,

    #[serde(default)]
    pub transforms: Vec<TransformKind>,
}

/// A declared attribute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeYamlConfig {
    pub name: String,

    pub kind: ScalarKind,

    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub default: Option<serde_json::Value>,

    #[serde(default)]
    pub transforms: Vec<TransformKind>,
}

impl AttributeYamlConfig {
    fn schema(&self) -> Result<AttributeSchema, String> {
        let mut schema = AttributeSchema::new(self.name.clone(), self.kind);
        if self.optional {
            schema = schema.optional();
        }
        if let Some(default) = &self.default {
            schema = schema.with_default(self.default_value(default)?);
        }
        Ok(schema)
    }

    fn default_value(&self, default: &serde_json::Value) -> Result<AttributeValue, String> {
        coerce(&PayloadValue::from(default.clone()), self.kind).ok_or_else(|| {
            format!(
                "default of `{}` is not a valid {}",
                self.name,
                self.kind.as_str()
            )
        })
    }
}

/// Stock value transforms available from YAML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    NullToAbsent,
    EmptyStringToAbsent,
    TrimStrings,
    ParseRfc3339Date,
    UnixSecondsToDate,
}

impl TransformKind {
    pub fn transform(self) -> ValueTransform {
        match self {
            TransformKind::NullToAbsent => ValueTransform::null_to_absent(),
            TransformKind::EmptyStringToAbsent => ValueTransform::empty_string_to_absent(),
            TransformKind::TrimStrings => ValueTransform::trim_strings(),
            TransformKind::ParseRfc3339Date => ValueTransform::parse_rfc3339_date(),
            TransformKind::UnixSecondsToDate => ValueTransform::unix_seconds_to_date(),
        }
    }
}

fn transform_chain(kinds: &[TransformKind]) -> TransformChain {
    TransformChain::new(kinds.iter().map(|kind| kind.transform()))
}

/// Default ingest options of an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestYamlConfig {
    #[serde(default)]
    pub ordered: bool,

    #[serde(default)]
    pub prefetch: Vec<String>,

    #[serde(default = "true_value")]
    pub stamp_scope: bool,

    /// Attribute equalities every matched record must satisfy
    #[serde(default)]
    pub scope: BTreeMap<String, serde_json::Value>,
}

impl Default for IngestYamlConfig {
    fn default() -> Self {
        Self {
            ordered: false,
            prefetch: Vec::new(),
            stamp_scope: true,
            scope: BTreeMap::new(),
        }
    }
}

fn true_value() -> bool {
    true
}
