//! Storage collaborator contract.
//!
//! [`TableStore`] is the seam between the engine and the platform that owns
//! durable tables. The engine only ever asks for existence checks, reads,
//! mode-tagged saves, a structured merge primitive, and a compaction hint —
//! everything else (formats, transactions, distribution) belongs to the
//! implementation behind the trait.

pub mod memory;

use serde_json::Value as JsonValue;

use crate::config::types::SourceConfig;
use crate::error::{PipelineError, Result};
use crate::frame::{DataFrame, ScalarValue};

/// How a save replaces or extends existing table contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Overwrite,
    Append,
}

/// Parameters for a table save.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub mode: SaveMode,
    pub format: String,
    pub partition_by: Vec<String>,
    pub options: JsonValue,
}

impl SaveRequest {
    pub fn new(mode: SaveMode, format: impl Into<String>) -> Self {
        Self {
            mode,
            format: format.into(),
            partition_by: Vec::new(),
            options: JsonValue::Object(serde_json::Map::new()),
        }
    }

    pub fn with_partitions(mut self, partition_by: Vec<String>) -> Self {
        self.partition_by = partition_by;
        self
    }

    pub fn with_options(mut self, options: JsonValue) -> Self {
        self.options = options;
        self
    }
}

/// What to do with target rows matched by the merge keys.
#[derive(Debug, Clone)]
pub enum MergeAction {
    /// Update every non-key column from the matching source row.
    UpdateAllFromSource,
    /// Assign constant values to the named columns.
    SetColumns(Vec<(String, ScalarValue)>),
}

/// A structured upsert request: conditional column sets per matched and
/// unmatched branch.
#[derive(Debug, Clone)]
pub struct MergeSpec {
    /// Equality join keys between target and source.
    pub keys: Vec<String>,
    /// Predicate restricting which target rows may match (e.g. current-row
    /// flags for versioned tables).
    pub target_filter: Option<String>,
    /// Apply the matched action only when one of these columns differs
    /// between the matched rows; empty means unconditional.
    pub changed_only: Vec<String>,
    pub action: MergeAction,
    /// Insert source rows that match no eligible target row.
    pub insert_unmatched: bool,
}

impl MergeSpec {
    /// Plain upsert: update all non-key columns on match, insert the rest.
    pub fn upsert(keys: Vec<String>) -> Self {
        Self {
            keys,
            target_filter: None,
            changed_only: Vec::new(),
            action: MergeAction::UpdateAllFromSource,
            insert_unmatched: true,
        }
    }
}

/// Durable-table collaborator.
pub trait TableStore: Send + Sync {
    /// # Errors
    ///
    /// Backend failures.
    fn schema_exists(&self, catalog: &str, schema: &str) -> Result<bool>;

    /// Idempotent: a no-op when the schema already exists.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn create_schema_if_not_exists(&self, catalog: &str, schema: &str) -> Result<()>;

    /// # Errors
    ///
    /// Backend failures.
    fn table_exists(&self, catalog: &str, schema: &str, table: &str) -> Result<bool>;

    /// # Errors
    ///
    /// Fails when the table does not exist.
    fn read_table(&self, name: &str) -> Result<DataFrame>;

    /// Save a frame. Append creates the table when absent.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn save_table(&self, name: &str, frame: &DataFrame, request: &SaveRequest) -> Result<()>;

    /// Execute a structured merge against an existing table.
    ///
    /// # Errors
    ///
    /// Fails when the table does not exist or the spec references unknown
    /// columns.
    fn merge(&self, name: &str, source: &DataFrame, spec: &MergeSpec) -> Result<()>;

    /// Storage-layout compaction hint, optionally with an ordering column
    /// list.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn optimize(&self, name: &str, zorder_by: &[String]) -> Result<()>;

    /// Execute SQL text and return the result set.
    ///
    /// # Errors
    ///
    /// Fails on unsupported or invalid queries.
    fn sql(&self, query: &str) -> Result<DataFrame>;

    /// Read a connection-string-addressed relational source.
    ///
    /// # Errors
    ///
    /// Unsupported unless the backend overrides it.
    fn read_jdbc(&self, source: &SourceConfig) -> Result<DataFrame> {
        let _ = source;
        Err(PipelineError::Reader {
            kind: "jdbc".to_string(),
            message: "jdbc sources are not supported by this storage backend".to_string(),
        })
    }
}
