//! Typed pipeline configuration records.
//!
//! Documents are bound from merged YAML via [`PipelineConfig::from_yaml_value`],
//! which enforces the construction invariants: non-empty name, valid layer,
//! and single-source/source-list synchronization.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{PipelineError, Result};
use crate::quality::CheckSpec;

fn empty_object() -> JsonValue {
    JsonValue::Object(serde_json::Map::new())
}

fn default_true() -> bool {
    true
}

/// Medallion-architecture stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Bronze,
    Silver,
    Gold,
}

impl Layer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }

    /// Parse a lowercase layer name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the bad value.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "bronze" => Ok(Self::Bronze),
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            other => Err(PipelineError::Configuration(format!(
                "invalid layer: {other} (expected bronze, silver, or gold)"
            ))),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target write strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Overwrite,
    Append,
    Merge,
    Scd2,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Overwrite => "overwrite",
            Self::Append => "append",
            Self::Merge => "merge",
            Self::Scd2 => "scd2",
        };
        f.write_str(s)
    }
}

/// Source type tag. Unrecognized tags bind to `Generic` and fail at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Delta,
    Table,
    Parquet,
    Csv,
    Json,
    Jdbc,
    Sql,
    #[serde(other)]
    Generic,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Delta => "delta",
            Self::Table => "table",
            Self::Parquet => "parquet",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Jdbc => "jdbc",
            Self::Sql => "sql",
            Self::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// Where to read from. Locator completeness is validated at point of use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub path: Option<String>,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub connection_string: Option<String>,
    pub query: Option<String>,
    #[serde(default = "empty_object")]
    pub options: JsonValue,
}

impl SourceConfig {
    /// Fully-qualified table name, derived from whichever parts are present.
    pub fn full_table_name(&self) -> Option<String> {
        match (&self.catalog, &self.schema, &self.table) {
            (Some(c), Some(s), Some(t)) => Some(format!("{c}.{s}.{t}")),
            (None, Some(s), Some(t)) => Some(format!("{s}.{t}")),
            (_, None, Some(t)) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn option_str(&self, key: &str) -> Option<String> {
        match self.options.get(key) {
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(other) if !other.is_null() => Some(other.to_string()),
            _ => None,
        }
    }
}

fn default_format() -> String {
    "delta".to_string()
}

/// Where to write to. Target identity is always fully qualified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub mode: WriteMode,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub partition_by: Vec<String>,
    #[serde(default)]
    pub merge_keys: Vec<String>,
    #[serde(default)]
    pub scd_columns: Vec<String>,
    #[serde(default = "empty_object")]
    pub options: JsonValue,
}

impl TargetConfig {
    pub fn full_table_name(&self) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, self.table)
    }

    pub fn option_str(&self, key: &str) -> Option<String> {
        match self.options.get(key) {
            Some(JsonValue::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Truthy option: boolean `true` or the string `"true"`.
    pub fn option_flag(&self, key: &str) -> bool {
        match self.options.get(key) {
            Some(JsonValue::Bool(b)) => *b,
            Some(JsonValue::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn option_str_list(&self, key: &str) -> Vec<String> {
        match self.options.get(key) {
            Some(JsonValue::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(JsonValue::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

fn default_processing_mode() -> String {
    "full".to_string()
}

fn default_watermark_delay() -> String {
    "1 hour".to_string()
}

/// Processing behavior knobs. Carried through to the platform; the core only
/// reads `mode` and `watermark_column` during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_processing_mode")]
    pub mode: String,
    pub watermark_column: Option<String>,
    #[serde(default = "default_watermark_delay")]
    pub watermark_delay: String,
    pub batch_size: Option<u64>,
    pub parallelism: Option<u32>,
    pub checkpoint_location: Option<String>,
    pub trigger_interval: Option<String>,
    #[serde(default = "empty_object")]
    pub options: JsonValue,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            mode: default_processing_mode(),
            watermark_column: None,
            watermark_delay: default_watermark_delay(),
            batch_size: None,
            parallelism: None,
            checkpoint_location: None,
            trigger_interval: None,
            options: empty_object(),
        }
    }
}

/// One step in the transformation list. Order is execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationConfig {
    #[serde(rename = "type")]
    pub transform_type: String,
    #[serde(default = "empty_object")]
    pub params: JsonValue,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Data-quality check configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub fail_on_error: bool,
    #[serde(default)]
    pub checks: Vec<CheckSpec>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_on_error: false,
            checks: Vec::new(),
        }
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PipelineSection {
    #[serde(default)]
    name: String,
    #[serde(default)]
    layer: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PipelineDocument {
    #[serde(default)]
    pipeline: PipelineSection,
    source: Option<SourceConfig>,
    #[serde(default)]
    sources: Vec<SourceConfig>,
    target: Option<TargetConfig>,
    #[serde(default)]
    processing: ProcessingConfig,
    #[serde(default)]
    transformations: Vec<TransformationConfig>,
    #[serde(default)]
    quality: QualityConfig,
    #[serde(default = "empty_object")]
    parameters: JsonValue,
}

/// Complete pipeline configuration. Immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub name: String,
    pub layer: Layer,
    pub description: String,
    pub version: String,
    pub owner: String,
    pub tags: BTreeMap<String, String>,
    pub source: Option<SourceConfig>,
    pub sources: Vec<SourceConfig>,
    pub target: Option<TargetConfig>,
    pub processing: ProcessingConfig,
    pub transformations: Vec<TransformationConfig>,
    pub quality: QualityConfig,
    pub parameters: JsonValue,
}

impl PipelineConfig {
    /// Bind a merged YAML document into a validated configuration.
    ///
    /// # Errors
    ///
    /// Fails on an unbindable document, an empty pipeline name, or an invalid
    /// layer.
    pub fn from_yaml_value(value: serde_yaml::Value) -> Result<Self> {
        let doc: PipelineDocument = serde_yaml::from_value(value)
            .map_err(|e| PipelineError::Configuration(format!("invalid pipeline document: {e}")))?;

        if doc.pipeline.name.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "pipeline name is required".to_string(),
            ));
        }
        let layer = Layer::parse(doc.pipeline.layer.as_deref().unwrap_or("bronze"))?;

        // Keep the single-source and source-list views synchronized.
        let mut source = doc.source;
        let mut sources = doc.sources;
        match (&source, sources.is_empty()) {
            (Some(s), true) => sources = vec![s.clone()],
            (None, false) => source = Some(sources[0].clone()),
            _ => {}
        }

        Ok(Self {
            name: doc.pipeline.name,
            layer,
            description: doc.pipeline.description,
            version: doc.pipeline.version,
            owner: doc.pipeline.owner,
            tags: doc.pipeline.tags,
            source,
            sources,
            target: doc.target,
            processing: doc.processing,
            transformations: doc.transformations,
            quality: doc.quality,
            parameters: doc.parameters,
        })
    }

    /// Bind directly from YAML text (no variable substitution; see
    /// [`crate::config::loader::ConfigLoader`] for the full resolution path).
    ///
    /// # Errors
    ///
    /// Fails on malformed YAML or an invalid document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| PipelineError::Configuration(format!("invalid YAML: {e}")))?;
        Self::from_yaml_value(value)
    }
}
