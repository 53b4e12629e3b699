//! In-memory [`TableStore`] backend.
//!
//! Backs tests, dry runs, and the CLI's default runtime. Tables live in a
//! locked map keyed by fully-qualified name; merge is implemented with hash
//! matching plus arrow take/zip kernels, and `sql` understands plain
//! `SELECT [cols|*] FROM table [WHERE predicate]` queries.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use arrow::array::{BooleanArray, Scalar, UInt32Array};
use arrow::compute::kernels::zip::zip;
use arrow::compute::{cast, take};
use sqlparser::ast::{SelectItem, SetExpr, Statement, TableFactor};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::config::types::SourceConfig;
use crate::error::{PipelineError, Result};
use crate::frame::expr::CompiledExpr;
use crate::frame::DataFrame;
use crate::store::{MergeAction, MergeSpec, SaveMode, SaveRequest, TableStore};

/// One recorded compaction hint, observable by tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeEvent {
    pub table: String,
    pub zorder_by: Vec<String>,
}

#[derive(Debug, Clone)]
struct StoredTable {
    frame: DataFrame,
    format: String,
    partition_by: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    schemas: HashSet<String>,
    tables: HashMap<String, StoredTable>,
    optimize_log: Vec<OptimizeEvent>,
}

/// In-memory table store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock still holds usable state for an in-memory map.
    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a table directly, bypassing the save path.
    pub fn register_table(&self, name: impl Into<String>, frame: DataFrame) {
        self.write_state().tables.insert(
            name.into(),
            StoredTable {
                frame,
                format: "delta".to_string(),
                partition_by: Vec::new(),
            },
        );
    }

    /// Partition columns recorded for a saved table.
    pub fn table_partitions(&self, name: &str) -> Option<Vec<String>> {
        self.read_state()
            .tables
            .get(name)
            .map(|t| t.partition_by.clone())
    }

    /// Format recorded for a saved table.
    pub fn table_format(&self, name: &str) -> Option<String> {
        self.read_state().tables.get(name).map(|t| t.format.clone())
    }

    /// Compaction hints received so far, in order.
    pub fn optimize_events(&self) -> Vec<OptimizeEvent> {
        self.read_state().optimize_log.clone()
    }
}

impl TableStore for MemoryStore {
    fn schema_exists(&self, catalog: &str, schema: &str) -> Result<bool> {
        Ok(self
            .read_state()
            .schemas
            .contains(&format!("{catalog}.{schema}")))
    }

    fn create_schema_if_not_exists(&self, catalog: &str, schema: &str) -> Result<()> {
        self.write_state()
            .schemas
            .insert(format!("{catalog}.{schema}"));
        Ok(())
    }

    fn table_exists(&self, catalog: &str, schema: &str, table: &str) -> Result<bool> {
        Ok(self
            .read_state()
            .tables
            .contains_key(&format!("{catalog}.{schema}.{table}")))
    }

    fn read_table(&self, name: &str) -> Result<DataFrame> {
        self.read_state()
            .tables
            .get(name)
            .map(|t| t.frame.clone())
            .ok_or_else(|| PipelineError::Reader {
                kind: "table".to_string(),
                message: format!("table not found: {name}"),
            })
    }

    fn save_table(&self, name: &str, frame: &DataFrame, request: &SaveRequest) -> Result<()> {
        let mut state = self.write_state();
        match request.mode {
            SaveMode::Overwrite => {
                state.tables.insert(
                    name.to_string(),
                    StoredTable {
                        frame: frame.clone(),
                        format: request.format.clone(),
                        partition_by: request.partition_by.clone(),
                    },
                );
            }
            SaveMode::Append => match state.tables.get_mut(name) {
                Some(stored) => {
                    stored.frame = stored.frame.concat(frame)?;
                }
                None => {
                    state.tables.insert(
                        name.to_string(),
                        StoredTable {
                            frame: frame.clone(),
                            format: request.format.clone(),
                            partition_by: request.partition_by.clone(),
                        },
                    );
                }
            },
        }
        Ok(())
    }

    fn merge(&self, name: &str, source: &DataFrame, spec: &MergeSpec) -> Result<()> {
        let mut state = self.write_state();
        let stored = state
            .tables
            .get_mut(name)
            .ok_or_else(|| PipelineError::Writer {
                table: name.to_string(),
                message: "merge target table not found".to_string(),
            })?;
        let target = stored.frame.clone();
        let rows = target.num_rows();

        let eligible: Vec<bool> = match &spec.target_filter {
            Some(filter) => CompiledExpr::parse(filter)?
                .mask(&target)?
                .iter()
                .map(|slot| slot == Some(true))
                .collect(),
            None => vec![true; rows],
        };

        // First source row wins per key.
        let mut source_index: HashMap<String, u32> = HashMap::new();
        for row in 0..source.num_rows() {
            let key = source.group_key(row, &spec.keys)?;
            source_index.entry(key).or_insert(row as u32);
        }

        let mut match_indices: Vec<Option<u32>> = Vec::with_capacity(rows);
        let mut update_mask: Vec<Option<bool>> = Vec::with_capacity(rows);
        for row in 0..rows {
            let matched = if eligible[row] {
                source_index
                    .get(&target.group_key(row, &spec.keys)?)
                    .copied()
            } else {
                None
            };
            let update = match matched {
                None => false,
                Some(source_row) if !spec.changed_only.is_empty() => {
                    let mut changed = false;
                    for column in &spec.changed_only {
                        if !target.has_column(column) || !source.has_column(column) {
                            continue;
                        }
                        let target_value = target.value(column, row)?;
                        let source_value = source.value(column, source_row as usize)?;
                        // A null on either side is unknown, not a change.
                        if matches!(
                            target_value.compare(&source_value),
                            Some(ordering) if ordering != std::cmp::Ordering::Equal
                        ) {
                            changed = true;
                            break;
                        }
                    }
                    changed
                }
                Some(_) => true,
            };
            match_indices.push(matched);
            update_mask.push(Some(update));
        }
        let mask = BooleanArray::from(update_mask);

        let mut updated = target.clone();
        match &spec.action {
            MergeAction::UpdateAllFromSource => {
                let indices = UInt32Array::from(match_indices);
                for field in target.schema().fields() {
                    let column = field.name();
                    if spec.keys.contains(column) {
                        continue;
                    }
                    let Some(source_column) = source.column(column) else {
                        continue;
                    };
                    let source_column = if source_column.data_type() == field.data_type() {
                        source_column.clone()
                    } else {
                        cast(source_column.as_ref(), field.data_type())?
                    };
                    let aligned = take(source_column.as_ref(), &indices, None)?;
                    let current = updated
                        .column(column)
                        .ok_or_else(|| PipelineError::Writer {
                            table: name.to_string(),
                            message: format!("column not found during merge: {column}"),
                        })?
                        .clone();
                    let merged = zip(&mask, &aligned, &current)?;
                    updated = updated.with_column(column, merged)?;
                }
            }
            MergeAction::SetColumns(assignments) => {
                for (column, value) in assignments {
                    let current = updated
                        .column(column)
                        .ok_or_else(|| PipelineError::Writer {
                            table: name.to_string(),
                            message: format!("column not found during merge: {column}"),
                        })?
                        .clone();
                    let fill = crate::frame::scalar_array(value, current.data_type())?;
                    let merged = zip(&mask, &Scalar::new(fill), &current)?;
                    updated = updated.with_column(column, merged)?;
                }
            }
        }

        if spec.insert_unmatched {
            let mut eligible_keys = HashSet::new();
            for row in 0..rows {
                if eligible[row] {
                    eligible_keys.insert(target.group_key(row, &spec.keys)?);
                }
            }
            let mut insert_mask = Vec::with_capacity(source.num_rows());
            for row in 0..source.num_rows() {
                let key = source.group_key(row, &spec.keys)?;
                insert_mask.push(Some(!eligible_keys.contains(&key)));
            }
            let inserts = source.filter_mask(&BooleanArray::from(insert_mask))?;
            if inserts.num_rows() > 0 {
                updated = updated.concat(&inserts)?;
            }
        }

        stored.frame = updated;
        Ok(())
    }

    fn optimize(&self, name: &str, zorder_by: &[String]) -> Result<()> {
        tracing::info!(table = name, ?zorder_by, "Optimize hint recorded");
        self.write_state().optimize_log.push(OptimizeEvent {
            table: name.to_string(),
            zorder_by: zorder_by.to_vec(),
        });
        Ok(())
    }

    fn sql(&self, query: &str) -> Result<DataFrame> {
        let statements = Parser::parse_sql(&GenericDialect {}, query)
            .map_err(|e| PipelineError::Expression(format!("cannot parse SQL: {e}")))?;
        let [statement] = statements.as_slice() else {
            return Err(PipelineError::Expression(
                "expected exactly one SQL statement".to_string(),
            ));
        };
        let Statement::Query(boxed_query) = statement else {
            return Err(PipelineError::Expression(
                "only SELECT queries are supported".to_string(),
            ));
        };
        let SetExpr::Select(select) = boxed_query.body.as_ref() else {
            return Err(PipelineError::Expression(
                "only plain SELECT queries are supported".to_string(),
            ));
        };

        let [from] = select.from.as_slice() else {
            return Err(PipelineError::Expression(
                "query must select from exactly one table".to_string(),
            ));
        };
        if !from.joins.is_empty() {
            return Err(PipelineError::Expression(
                "joins are not supported in SQL sources".to_string(),
            ));
        }
        let TableFactor::Table { name, .. } = &from.relation else {
            return Err(PipelineError::Expression(
                "query must select from a named table".to_string(),
            ));
        };
        let table_name = name
            .0
            .iter()
            .map(|part| part.to_string())
            .collect::<Vec<_>>()
            .join(".");

        let mut frame = self.read_table(&table_name)?;

        if let Some(selection) = &select.selection {
            let mask = CompiledExpr::parse(&selection.to_string())?.mask(&frame)?;
            frame = frame.filter_mask(&mask)?;
        }

        let wildcard = matches!(select.projection.as_slice(), [SelectItem::Wildcard(_)]);
        if !wildcard {
            let mut columns = Vec::with_capacity(select.projection.len());
            for item in &select.projection {
                match item {
                    SelectItem::UnnamedExpr(sqlparser::ast::Expr::Identifier(ident)) => {
                        columns.push(ident.value.clone());
                    }
                    other => {
                        return Err(PipelineError::Expression(format!(
                            "unsupported projection: {other}"
                        )))
                    }
                }
            }
            frame = frame.select(&columns)?;
        }

        Ok(frame)
    }

    fn read_jdbc(&self, source: &SourceConfig) -> Result<DataFrame> {
        let _ = source;
        Err(PipelineError::Reader {
            kind: "jdbc".to_string(),
            message: "jdbc sources are not supported by the in-memory store".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ScalarValue;
    use arrow::array::{ArrayRef, Int64Array, RecordBatch, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    fn frame(ids: Vec<i64>, names: Vec<Option<&str>>) -> DataFrame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        DataFrame::new(
            RecordBatch::try_new(
                schema,
                vec![
                    Arc::new(Int64Array::from(ids)) as ArrayRef,
                    Arc::new(StringArray::from(names)) as ArrayRef,
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn schema_creation_is_idempotent() {
        let store = MemoryStore::new();
        assert!(!store.schema_exists("main", "raw").unwrap());
        store.create_schema_if_not_exists("main", "raw").unwrap();
        store.create_schema_if_not_exists("main", "raw").unwrap();
        assert!(store.schema_exists("main", "raw").unwrap());
    }

    #[test]
    fn append_creates_missing_table() {
        let store = MemoryStore::new();
        let request = SaveRequest::new(SaveMode::Append, "delta");
        store
            .save_table("main.raw.t", &frame(vec![1], vec![Some("a")]), &request)
            .unwrap();
        store
            .save_table("main.raw.t", &frame(vec![2], vec![Some("b")]), &request)
            .unwrap();
        let stored = store.read_table("main.raw.t").unwrap();
        assert_eq!(stored.num_rows(), 2);
    }

    #[test]
    fn overwrite_replaces_contents_and_records_partitions() {
        let store = MemoryStore::new();
        let request = SaveRequest::new(SaveMode::Overwrite, "delta")
            .with_partitions(vec!["name".to_string()]);
        store
            .save_table("t", &frame(vec![1, 2], vec![Some("a"), Some("b")]), &request)
            .unwrap();
        store
            .save_table("t", &frame(vec![9], vec![Some("z")]), &request)
            .unwrap();
        assert_eq!(store.read_table("t").unwrap().num_rows(), 1);
        assert_eq!(store.table_partitions("t").unwrap(), vec!["name"]);
    }

    #[test]
    fn upsert_updates_matches_and_inserts_the_rest() {
        let store = MemoryStore::new();
        store.register_table("t", frame(vec![1, 2], vec![Some("old"), Some("keep")]));
        let source = frame(vec![1, 3], vec![Some("new"), Some("fresh")]);
        store
            .merge("t", &source, &MergeSpec::upsert(vec!["id".to_string()]))
            .unwrap();
        let result = store.read_table("t").unwrap();
        assert_eq!(result.num_rows(), 3);
        assert_eq!(
            result.value("name", 0).unwrap(),
            ScalarValue::Utf8("new".to_string())
        );
        assert_eq!(
            result.value("name", 1).unwrap(),
            ScalarValue::Utf8("keep".to_string())
        );
        assert_eq!(
            result.value("name", 2).unwrap(),
            ScalarValue::Utf8("fresh".to_string())
        );
    }

    #[test]
    fn merge_set_columns_honors_target_filter_and_change_detection() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("is_current", DataType::Boolean, true),
        ]));
        let target = DataFrame::new(
            RecordBatch::try_new(
                schema,
                vec![
                    Arc::new(Int64Array::from(vec![1, 1, 2])) as ArrayRef,
                    Arc::new(StringArray::from(vec![
                        Some("v1"),
                        Some("v2"),
                        Some("same"),
                    ])) as ArrayRef,
                    Arc::new(arrow::array::BooleanArray::from(vec![
                        Some(false),
                        Some(true),
                        Some(true),
                    ])) as ArrayRef,
                ],
            )
            .unwrap(),
        );
        let store = MemoryStore::new();
        store.register_table("t", target);

        let source = frame(vec![1, 2], vec![Some("v3"), Some("same")]);
        let spec = MergeSpec {
            keys: vec!["id".to_string()],
            target_filter: Some("is_current = true".to_string()),
            changed_only: vec!["name".to_string()],
            action: MergeAction::SetColumns(vec![(
                "is_current".to_string(),
                ScalarValue::Boolean(false),
            )]),
            insert_unmatched: false,
        };
        store.merge("t", &source, &spec).unwrap();

        let result = store.read_table("t").unwrap();
        assert_eq!(result.num_rows(), 3);
        // Historical row untouched, changed current row closed, unchanged
        // current row left alone.
        assert_eq!(
            result.value("is_current", 0).unwrap(),
            ScalarValue::Boolean(false)
        );
        assert_eq!(
            result.value("is_current", 1).unwrap(),
            ScalarValue::Boolean(false)
        );
        assert_eq!(
            result.value("is_current", 2).unwrap(),
            ScalarValue::Boolean(true)
        );
    }

    #[test]
    fn merge_against_missing_table_errors() {
        let store = MemoryStore::new();
        let err = store
            .merge(
                "nope",
                &frame(vec![1], vec![Some("a")]),
                &MergeSpec::upsert(vec!["id".to_string()]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn optimize_events_are_recorded() {
        let store = MemoryStore::new();
        store
            .optimize("t", &["region".to_string(), "day".to_string()])
            .unwrap();
        let events = store.optimize_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].table, "t");
        assert_eq!(events[0].zorder_by, vec!["region", "day"]);
    }

    #[test]
    fn sql_select_star_with_where() {
        let store = MemoryStore::new();
        store.register_table(
            "main.raw.users",
            frame(vec![1, 2, 3], vec![Some("a"), Some("b"), Some("c")]),
        );
        let result = store
            .sql("SELECT * FROM main.raw.users WHERE id > 1")
            .unwrap();
        assert_eq!(result.num_rows(), 2);
    }

    #[test]
    fn sql_projection_by_name() {
        let store = MemoryStore::new();
        store.register_table("users", frame(vec![1], vec![Some("a")]));
        let result = store.sql("SELECT name FROM users").unwrap();
        assert_eq!(result.column_names(), vec!["name"]);
    }

    #[test]
    fn sql_rejects_non_select() {
        let store = MemoryStore::new();
        assert!(store.sql("DROP TABLE users").is_err());
    }

    #[test]
    fn jdbc_reads_are_unsupported() {
        let store = MemoryStore::new();
        let source: SourceConfig = serde_yaml::from_str(
            "type: jdbc\nconnection_string: jdbc:postgresql://localhost/db\ntable: users\n",
        )
        .unwrap();
        let err = store.read_jdbc(&source).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }
}
