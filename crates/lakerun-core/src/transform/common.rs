//! Built-in transform implementations.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};

use arrow::array::{ArrayRef, StringArray, TimestampMicrosecondArray, UInt32Array};
use arrow::datatypes::{DataType, TimeUnit};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use crate::error::{PipelineError, Result};
use crate::frame::expr::CompiledExpr;
use crate::frame::{array_from_scalars, display_value, DataFrame, ScalarValue};
use crate::transform::{Transform, TransformRegistry};

static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^decimal\((\d+)\s*,\s*(\d+)\)$").expect("valid decimal regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

pub(crate) fn register_builtins(registry: &mut TransformRegistry) {
    registry.register("add_timestamp", |p| Ok(Box::new(AddTimestamp::from_params(p)?)));
    registry.register("cast_columns", |p| Ok(Box::new(CastColumns::from_params(p)?)));
    registry.register("rename_columns", |p| {
        Ok(Box::new(RenameColumns::from_params(p)?))
    });
    registry.register("filter_rows", |p| Ok(Box::new(FilterRows::from_params(p)?)));
    registry.register("deduplicate", |p| Ok(Box::new(Deduplicate::from_params(p)?)));
    registry.register("select_columns", |p| {
        Ok(Box::new(SelectColumns::from_params(p)?))
    });
    registry.register("drop_columns", |p| Ok(Box::new(DropColumns::from_params(p)?)));
    registry.register("fill_nulls", |p| Ok(Box::new(FillNulls::from_params(p)?)));
    registry.register("standardize_strings", |p| {
        Ok(Box::new(StandardizeStrings::from_params(p)?))
    });
    registry.register("add_derived_column", |p| {
        Ok(Box::new(AddDerivedColumn::from_params(p)?))
    });
    registry.register("hash_column", |p| Ok(Box::new(HashColumn::from_params(p)?)));
}

fn parse_params<'de, T: Deserialize<'de>>(kind: &str, params: &'de JsonValue) -> Result<T> {
    T::deserialize(params)
        .map_err(|e| PipelineError::Transformation(format!("invalid {kind} params: {e}")))
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// add_timestamp
// ---------------------------------------------------------------------------

fn default_timestamp_column() -> String {
    "ingestion_timestamp".to_string()
}

#[derive(Debug, Deserialize)]
struct AddTimestampParams {
    #[serde(default = "default_timestamp_column")]
    column_name: String,
    value: Option<String>,
}

/// Stamp every row with the current time, or a fixed timestamp from params.
pub struct AddTimestamp {
    column_name: String,
    value_micros: Option<i64>,
}

impl AddTimestamp {
    pub fn from_params(params: &JsonValue) -> Result<Self> {
        let params: AddTimestampParams = parse_params("add_timestamp", params)?;
        let value_micros = params
            .value
            .as_deref()
            .map(parse_timestamp_micros)
            .transpose()?;
        Ok(Self {
            column_name: params.column_name,
            value_micros,
        })
    }
}

fn parse_timestamp_micros(text: &str) -> Result<i64> {
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(text) {
        return Ok(ts.timestamp_micros());
    }
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map(|ts| ts.and_utc().timestamp_micros())
        .map_err(|_| PipelineError::Transformation(format!("invalid timestamp value: {text}")))
}

impl Transform for AddTimestamp {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let micros = self
            .value_micros
            .unwrap_or_else(|| chrono::Utc::now().timestamp_micros());
        let column: ArrayRef = Arc::new(TimestampMicrosecondArray::from_value(
            micros,
            frame.num_rows(),
        ));
        frame.with_column(&self.column_name, column)
    }
}

// ---------------------------------------------------------------------------
// cast_columns
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CastColumnsParams {
    column_types: BTreeMap<String, String>,
    #[serde(default)]
    strict: bool,
}

/// Cast columns to named target types.
pub struct CastColumns {
    column_types: BTreeMap<String, String>,
    strict: bool,
}

impl CastColumns {
    pub fn from_params(params: &JsonValue) -> Result<Self> {
        let params: CastColumnsParams = parse_params("cast_columns", params)?;
        Ok(Self {
            column_types: params.column_types,
            strict: params.strict,
        })
    }
}

/// Map a configured type name to an arrow type.
///
/// # Errors
///
/// Unknown names always error, regardless of strict mode.
pub fn resolve_cast_type(type_name: &str) -> Result<DataType> {
    let lowered = type_name.to_lowercase();
    let data_type = match lowered.as_str() {
        "string" => DataType::Utf8,
        "int" | "integer" => DataType::Int32,
        "long" | "bigint" => DataType::Int64,
        "double" => DataType::Float64,
        "float" => DataType::Float32,
        "boolean" | "bool" => DataType::Boolean,
        "date" => DataType::Date32,
        "timestamp" => DataType::Timestamp(TimeUnit::Microsecond, None),
        other if other.starts_with("decimal") => match DECIMAL_RE.captures(other) {
            Some(caps) => {
                let precision: u8 = caps[1].parse().map_err(|_| {
                    PipelineError::Transformation(format!("invalid decimal precision: {other}"))
                })?;
                let scale: i8 = caps[2].parse().map_err(|_| {
                    PipelineError::Transformation(format!("invalid decimal scale: {other}"))
                })?;
                DataType::Decimal128(precision, scale)
            }
            None => DataType::Decimal128(38, 10),
        },
        other => {
            return Err(PipelineError::Transformation(format!(
                "unknown cast type: {other}"
            )))
        }
    };
    Ok(data_type)
}

impl Transform for CastColumns {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mut result = frame.clone();
        for (column, type_name) in &self.column_types {
            if !result.has_column(column) {
                if self.strict {
                    return Err(PipelineError::Transformation(format!(
                        "column not found: {column}"
                    )));
                }
                continue;
            }
            let data_type = resolve_cast_type(type_name)?;
            result = result.cast_column(column, &data_type)?;
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// rename_columns
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RenameColumnsParams {
    column_mapping: BTreeMap<String, String>,
    #[serde(default)]
    strict: bool,
}

/// Rename columns according to an old→new mapping.
pub struct RenameColumns {
    column_mapping: BTreeMap<String, String>,
    strict: bool,
}

impl RenameColumns {
    pub fn from_params(params: &JsonValue) -> Result<Self> {
        let params: RenameColumnsParams = parse_params("rename_columns", params)?;
        Ok(Self {
            column_mapping: params.column_mapping,
            strict: params.strict,
        })
    }
}

impl Transform for RenameColumns {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mut result = frame.clone();
        for (old, new) in &self.column_mapping {
            if !result.has_column(old) {
                if self.strict {
                    return Err(PipelineError::Transformation(format!(
                        "column not found: {old}"
                    )));
                }
                continue;
            }
            result = result.rename_column(old, new)?;
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// filter_rows
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FilterRowsParams {
    condition: String,
    #[serde(default)]
    negate: bool,
}

/// Keep rows matching a SQL predicate. Rows evaluating to null are dropped
/// whether or not the predicate is negated.
pub struct FilterRows {
    condition: CompiledExpr,
    negate: bool,
}

impl FilterRows {
    pub fn from_params(params: &JsonValue) -> Result<Self> {
        let params: FilterRowsParams = parse_params("filter_rows", params)?;
        Ok(Self {
            condition: CompiledExpr::parse(&params.condition)?,
            negate: params.negate,
        })
    }
}

impl Transform for FilterRows {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mask = self.condition.mask(frame)?;
        let mask = if self.negate {
            mask.iter().map(|slot| slot.map(|b| !b)).collect()
        } else {
            mask
        };
        frame.filter_mask(&mask)
    }
}

// ---------------------------------------------------------------------------
// deduplicate
// ---------------------------------------------------------------------------

fn default_keep() -> String {
    "first".to_string()
}

#[derive(Debug, Deserialize)]
struct DeduplicateParams {
    subset: Option<Vec<String>>,
    #[serde(default = "default_keep")]
    keep: String,
    order_by: Option<Vec<String>>,
    #[serde(default = "default_true")]
    order_desc: bool,
}

/// Remove duplicate rows, optionally ranking within key partitions.
pub struct Deduplicate {
    subset: Option<Vec<String>>,
    keep: String,
    order_by: Vec<String>,
    order_desc: bool,
}

impl Deduplicate {
    pub fn from_params(params: &JsonValue) -> Result<Self> {
        let params: DeduplicateParams = parse_params("deduplicate", params)?;
        Ok(Self {
            subset: params.subset,
            keep: params.keep,
            order_by: params.order_by.unwrap_or_default(),
            order_desc: params.order_desc,
        })
    }
}

/// Ordering over value sequences where null ranks below everything.
fn compare_order_values(a: &[ScalarValue], b: &[ScalarValue]) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    for (left, right) in a.iter().zip(b) {
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

impl Transform for Deduplicate {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let ranked = !self.order_by.is_empty() && matches!(self.keep.as_str(), "first" | "last");
        if !ranked {
            return frame.distinct(self.subset.as_deref());
        }

        let partition_cols: Vec<String> = match &self.subset {
            Some(cols) if !cols.is_empty() => cols.clone(),
            _ => frame.column_names(),
        };
        // `last` flips the ranking direction rather than taking the tail.
        let keep_max = (self.keep == "last") == self.order_desc;

        let mut winners: HashMap<String, (usize, Vec<ScalarValue>)> = HashMap::new();
        for row in 0..frame.num_rows() {
            let key = frame.group_key(row, &partition_cols)?;
            let order_values: Vec<ScalarValue> = self
                .order_by
                .iter()
                .map(|col| frame.value(col, row))
                .collect::<Result<_>>()?;
            match winners.get(&key) {
                Some((_, best)) => {
                    let ordering = compare_order_values(&order_values, best);
                    let better = if keep_max {
                        ordering == std::cmp::Ordering::Greater
                    } else {
                        ordering == std::cmp::Ordering::Less
                    };
                    if better {
                        winners.insert(key, (row, order_values));
                    }
                }
                None => {
                    winners.insert(key, (row, order_values));
                }
            }
        }

        let mut keep: Vec<u32> = winners.values().map(|(row, _)| *row as u32).collect();
        keep.sort_unstable();
        let indices: Vec<Option<u32>> = keep.into_iter().map(Some).collect();
        frame.take_indices(&UInt32Array::from(indices))
    }
}

// ---------------------------------------------------------------------------
// select_columns / drop_columns
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SelectColumnsParams {
    columns: Vec<String>,
    #[serde(default)]
    strict: bool,
}

/// Project to the named columns; missing targets are skipped unless strict.
pub struct SelectColumns {
    columns: Vec<String>,
    strict: bool,
}

impl SelectColumns {
    pub fn from_params(params: &JsonValue) -> Result<Self> {
        let params: SelectColumnsParams = parse_params("select_columns", params)?;
        Ok(Self {
            columns: params.columns,
            strict: params.strict,
        })
    }
}

impl Transform for SelectColumns {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        if self.strict {
            let missing: Vec<&str> = self
                .columns
                .iter()
                .filter(|c| !frame.has_column(c))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(PipelineError::Transformation(format!(
                    "columns not found: {}",
                    missing.join(", ")
                )));
            }
        }
        let existing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| frame.has_column(c))
            .cloned()
            .collect();
        frame.select(&existing)
    }
}

#[derive(Debug, Deserialize)]
struct DropColumnsParams {
    columns: Vec<String>,
    #[serde(default = "default_true")]
    ignore_missing: bool,
}

/// Drop the named columns; missing columns are ignored by default.
pub struct DropColumns {
    columns: Vec<String>,
    ignore_missing: bool,
}

impl DropColumns {
    pub fn from_params(params: &JsonValue) -> Result<Self> {
        let params: DropColumnsParams = parse_params("drop_columns", params)?;
        Ok(Self {
            columns: params.columns,
            ignore_missing: params.ignore_missing,
        })
    }
}

impl Transform for DropColumns {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        if !self.ignore_missing {
            if let Some(missing) = self.columns.iter().find(|c| !frame.has_column(c)) {
                return Err(PipelineError::Transformation(format!(
                    "column not found: {missing}"
                )));
            }
        }
        frame.drop_columns(&self.columns)
    }
}

// ---------------------------------------------------------------------------
// fill_nulls
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FillNullsParams {
    fill_values: BTreeMap<String, JsonValue>,
    subset: Option<Vec<String>>,
}

/// Fill nulls per column, optionally restricted to a subset.
pub struct FillNulls {
    fill_values: BTreeMap<String, JsonValue>,
    subset: Option<Vec<String>>,
}

impl FillNulls {
    pub fn from_params(params: &JsonValue) -> Result<Self> {
        let params: FillNullsParams = parse_params("fill_nulls", params)?;
        Ok(Self {
            fill_values: params.fill_values,
            subset: params.subset,
        })
    }
}

impl Transform for FillNulls {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mut result = frame.clone();
        for (column, value) in &self.fill_values {
            if let Some(subset) = &self.subset {
                if !subset.contains(column) {
                    continue;
                }
            }
            if !result.has_column(column) {
                continue;
            }
            result = result.fill_null(column, &ScalarValue::from_json(value))?;
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// standardize_strings
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StandardizeStringsParams {
    columns: Vec<String>,
    #[serde(default = "default_true")]
    trim: bool,
    #[serde(default)]
    lowercase: bool,
    #[serde(default)]
    uppercase: bool,
    #[serde(default)]
    remove_extra_spaces: bool,
}

/// Normalize string columns: trim, then case, then whitespace collapse.
pub struct StandardizeStrings {
    columns: Vec<String>,
    trim: bool,
    lowercase: bool,
    uppercase: bool,
    remove_extra_spaces: bool,
}

impl StandardizeStrings {
    pub fn from_params(params: &JsonValue) -> Result<Self> {
        let params: StandardizeStringsParams = parse_params("standardize_strings", params)?;
        Ok(Self {
            columns: params.columns,
            trim: params.trim,
            lowercase: params.lowercase,
            uppercase: params.uppercase,
            remove_extra_spaces: params.remove_extra_spaces,
        })
    }

    fn standardize(&self, value: &str) -> String {
        let mut out = if self.trim {
            value.trim().to_string()
        } else {
            value.to_string()
        };
        if self.lowercase {
            out = out.to_lowercase();
        } else if self.uppercase {
            out = out.to_uppercase();
        }
        if self.remove_extra_spaces {
            out = WHITESPACE_RE.replace_all(&out, " ").into_owned();
        }
        out
    }
}

impl Transform for StandardizeStrings {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mut result = frame.clone();
        for column in &self.columns {
            let Some(array) = result.column(column) else {
                continue;
            };
            let Some(strings) = array.as_any().downcast_ref::<StringArray>() else {
                tracing::debug!(column, "Skipping non-string column in standardize_strings");
                continue;
            };
            let standardized: StringArray = strings
                .iter()
                .map(|value| value.map(|v| self.standardize(v)))
                .collect();
            result = result.with_column(column, Arc::new(standardized))?;
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// add_derived_column
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AddDerivedColumnParams {
    column_name: String,
    expression: String,
}

/// Add a column computed from a SQL scalar expression.
pub struct AddDerivedColumn {
    column_name: String,
    expression: CompiledExpr,
}

impl AddDerivedColumn {
    pub fn from_params(params: &JsonValue) -> Result<Self> {
        let params: AddDerivedColumnParams = parse_params("add_derived_column", params)?;
        Ok(Self {
            column_name: params.column_name,
            expression: CompiledExpr::parse(&params.expression)?,
        })
    }
}

impl Transform for AddDerivedColumn {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let values = self.expression.values(frame)?;
        frame.with_column(&self.column_name, array_from_scalars(&values)?)
    }
}

// ---------------------------------------------------------------------------
// hash_column
// ---------------------------------------------------------------------------

fn default_algorithm() -> String {
    "sha256".to_string()
}

#[derive(Debug, Deserialize)]
struct HashColumnParams {
    column_name: String,
    source_columns: Vec<String>,
    #[serde(default = "default_algorithm")]
    algorithm: String,
}

/// Digest column over `|`-joined, null-coalesced source column renderings.
#[derive(Debug)]
pub struct HashColumn {
    column_name: String,
    source_columns: Vec<String>,
}

impl HashColumn {
    pub fn from_params(params: &JsonValue) -> Result<Self> {
        let params: HashColumnParams = parse_params("hash_column", params)?;
        if params.algorithm != "sha256" {
            return Err(PipelineError::Transformation(format!(
                "unsupported hash algorithm: {}",
                params.algorithm
            )));
        }
        Ok(Self {
            column_name: params.column_name,
            source_columns: params.source_columns,
        })
    }
}

impl Transform for HashColumn {
    fn apply(&self, frame: &DataFrame) -> Result<DataFrame> {
        let columns: Vec<&ArrayRef> = self
            .source_columns
            .iter()
            .map(|name| {
                frame.column(name).ok_or_else(|| {
                    PipelineError::Transformation(format!("column not found: {name}"))
                })
            })
            .collect::<Result<_>>()?;

        let mut hashes: Vec<Option<String>> = Vec::with_capacity(frame.num_rows());
        for row in 0..frame.num_rows() {
            let joined = columns
                .iter()
                .map(|column| {
                    if column.is_null(row) {
                        String::new()
                    } else {
                        display_value(column.as_ref(), row)
                    }
                })
                .collect::<Vec<_>>()
                .join("|");
            let digest = Sha256::digest(joined.as_bytes());
            hashes.push(Some(format!("{digest:x}")));
        }
        frame.with_column(&self.column_name, Arc::new(StringArray::from(hashes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::test_support::sample_frame;
    use arrow::array::{Float64Array, Int64Array, RecordBatch};
    use arrow::datatypes::{Field, Schema};
    use serde_json::json;

    #[test]
    fn cast_missing_column_is_skipped_unless_strict() {
        let frame = sample_frame();
        let lenient = CastColumns::from_params(&json!({
            "column_types": {"missing": "string"}
        }))
        .unwrap();
        let result = lenient.apply(&frame).unwrap();
        assert_eq!(result.column_names(), frame.column_names());

        let strict = CastColumns::from_params(&json!({
            "column_types": {"missing": "string"},
            "strict": true
        }))
        .unwrap();
        let err = strict.apply(&frame).unwrap_err();
        assert!(matches!(err, PipelineError::Transformation(_)));
    }

    #[test]
    fn cast_unknown_type_always_errors() {
        let transform = CastColumns::from_params(&json!({
            "column_types": {"id": "varchar"}
        }))
        .unwrap();
        let err = transform.apply(&sample_frame()).unwrap_err();
        assert!(err.to_string().contains("unknown cast type"));
    }

    #[test]
    fn cast_decimal_spec_parses() {
        assert_eq!(
            resolve_cast_type("decimal(10,2)").unwrap(),
            DataType::Decimal128(10, 2)
        );
        // Malformed spec falls back to the wide default.
        assert_eq!(
            resolve_cast_type("decimal").unwrap(),
            DataType::Decimal128(38, 10)
        );
    }

    #[test]
    fn cast_applies_to_existing_columns() {
        let transform = CastColumns::from_params(&json!({
            "column_types": {"id": "string", "amount": "long"}
        }))
        .unwrap();
        let result = transform.apply(&sample_frame()).unwrap();
        assert_eq!(
            result.value("id", 0).unwrap(),
            ScalarValue::Utf8("1".to_string())
        );
        assert_eq!(result.value("amount", 2).unwrap(), ScalarValue::Int(30));
    }

    #[test]
    fn rename_skips_missing_unless_strict() {
        let transform = RenameColumns::from_params(&json!({
            "column_mapping": {"name": "customer", "ghost": "spook"}
        }))
        .unwrap();
        let result = transform.apply(&sample_frame()).unwrap();
        assert!(result.has_column("customer"));
        assert!(!result.has_column("spook"));

        let strict = RenameColumns::from_params(&json!({
            "column_mapping": {"ghost": "spook"},
            "strict": true
        }))
        .unwrap();
        assert!(strict.apply(&sample_frame()).is_err());
    }

    #[test]
    fn filter_rows_with_negate() {
        let keep = FilterRows::from_params(&json!({"condition": "amount > 0"})).unwrap();
        let result = keep.apply(&sample_frame()).unwrap();
        assert_eq!(result.num_rows(), 2);

        let negated = FilterRows::from_params(&json!({
            "condition": "amount > 0",
            "negate": true
        }))
        .unwrap();
        let result = negated.apply(&sample_frame()).unwrap();
        // The null-amount row is dropped in both directions.
        assert_eq!(result.num_rows(), 1);
        assert_eq!(result.value("id", 0).unwrap(), ScalarValue::Int(2));
    }

    fn versioned_frame() -> DataFrame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("ts", DataType::Int64, false),
            Field::new("score", DataType::Float64, false),
        ]));
        DataFrame::new(
            RecordBatch::try_new(
                schema,
                vec![
                    Arc::new(Int64Array::from(vec![1, 1, 2, 2, 2])) as ArrayRef,
                    Arc::new(Int64Array::from(vec![1, 2, 5, 9, 7])) as ArrayRef,
                    Arc::new(Float64Array::from(vec![0.1, 0.2, 0.5, 0.9, 0.7])) as ArrayRef,
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn deduplicate_keep_last_retains_latest() {
        let transform = Deduplicate::from_params(&json!({
            "subset": ["id"],
            "keep": "last",
            "order_by": ["ts"]
        }))
        .unwrap();
        let result = transform.apply(&versioned_frame()).unwrap();
        assert_eq!(result.num_rows(), 2);
        assert_eq!(result.value("ts", 0).unwrap(), ScalarValue::Int(2));
        assert_eq!(result.value("ts", 1).unwrap(), ScalarValue::Int(9));
    }

    #[test]
    fn deduplicate_keep_first_retains_earliest_by_default() {
        let transform = Deduplicate::from_params(&json!({
            "subset": ["id"],
            "keep": "first",
            "order_by": ["ts"]
        }))
        .unwrap();
        let result = transform.apply(&versioned_frame()).unwrap();
        assert_eq!(result.num_rows(), 2);
        assert_eq!(result.value("ts", 0).unwrap(), ScalarValue::Int(1));
        assert_eq!(result.value("ts", 1).unwrap(), ScalarValue::Int(5));
    }

    #[test]
    fn deduplicate_two_versions_keeps_newest() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("ts", DataType::Int64, false),
        ]));
        let frame = DataFrame::new(
            RecordBatch::try_new(
                schema,
                vec![
                    Arc::new(Int64Array::from(vec![1, 1])) as ArrayRef,
                    Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
                ],
            )
            .unwrap(),
        );
        let transform = Deduplicate::from_params(&json!({
            "subset": ["id"],
            "keep": "last",
            "order_by": ["ts"]
        }))
        .unwrap();
        let result = transform.apply(&frame).unwrap();
        assert_eq!(result.num_rows(), 1);
        assert_eq!(result.value("ts", 0).unwrap(), ScalarValue::Int(2));
    }

    #[test]
    fn deduplicate_without_order_drops_exact_duplicates() {
        let transform = Deduplicate::from_params(&json!({"subset": ["id"]})).unwrap();
        let result = transform.apply(&versioned_frame()).unwrap();
        assert_eq!(result.num_rows(), 2);
        // First occurrences survive.
        assert_eq!(result.value("ts", 0).unwrap(), ScalarValue::Int(1));
        assert_eq!(result.value("ts", 1).unwrap(), ScalarValue::Int(5));
    }

    #[test]
    fn select_narrows_and_skips_missing() {
        let transform = SelectColumns::from_params(&json!({
            "columns": ["id", "ghost"]
        }))
        .unwrap();
        let result = transform.apply(&sample_frame()).unwrap();
        assert_eq!(result.column_names(), vec!["id"]);

        let strict = SelectColumns::from_params(&json!({
            "columns": ["id", "ghost"],
            "strict": true
        }))
        .unwrap();
        let err = strict.apply(&sample_frame()).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn drop_ignores_missing_by_default() {
        let transform = DropColumns::from_params(&json!({
            "columns": ["amount", "ghost"]
        }))
        .unwrap();
        let result = transform.apply(&sample_frame()).unwrap();
        assert_eq!(result.column_names(), vec!["id", "name"]);

        let strict = DropColumns::from_params(&json!({
            "columns": ["ghost"],
            "ignore_missing": false
        }))
        .unwrap();
        assert!(strict.apply(&sample_frame()).is_err());
    }

    #[test]
    fn fill_nulls_with_subset_restriction() {
        let transform = FillNulls::from_params(&json!({
            "fill_values": {"amount": 0.0, "name": "unknown"},
            "subset": ["amount"]
        }))
        .unwrap();
        let result = transform.apply(&sample_frame()).unwrap();
        assert_eq!(result.value("amount", 3).unwrap(), ScalarValue::Float(0.0));
        // name was outside the subset, so its null survives.
        assert!(result.value("name", 2).unwrap().is_null());
    }

    #[test]
    fn standardize_strings_order_is_trim_case_whitespace() {
        let schema = Arc::new(Schema::new(vec![Field::new("s", DataType::Utf8, true)]));
        let frame = DataFrame::new(
            RecordBatch::try_new(
                schema,
                vec![Arc::new(StringArray::from(vec![
                    Some("  Hello   World  "),
                    None,
                ])) as ArrayRef],
            )
            .unwrap(),
        );
        let transform = StandardizeStrings::from_params(&json!({
            "columns": ["s", "ghost"],
            "lowercase": true,
            "remove_extra_spaces": true
        }))
        .unwrap();
        let result = transform.apply(&frame).unwrap();
        assert_eq!(
            result.value("s", 0).unwrap(),
            ScalarValue::Utf8("hello world".to_string())
        );
        assert!(result.value("s", 1).unwrap().is_null());
    }

    #[test]
    fn derived_column_from_expression() {
        let transform = AddDerivedColumn::from_params(&json!({
            "column_name": "double_amount",
            "expression": "amount * 2"
        }))
        .unwrap();
        let result = transform.apply(&sample_frame()).unwrap();
        assert_eq!(
            result.value("double_amount", 0).unwrap(),
            ScalarValue::Float(20.0)
        );
        assert!(result.value("double_amount", 3).unwrap().is_null());
    }

    #[test]
    fn hash_column_is_deterministic_and_null_coalescing() {
        let transform = HashColumn::from_params(&json!({
            "column_name": "row_hash",
            "source_columns": ["id", "name"]
        }))
        .unwrap();
        let a = transform.apply(&sample_frame()).unwrap();
        let b = transform.apply(&sample_frame()).unwrap();
        assert_eq!(a.value("row_hash", 0).unwrap(), b.value("row_hash", 0).unwrap());
        // Null name coalesces to empty string rather than null hash.
        assert!(!a.value("row_hash", 2).unwrap().is_null());
    }

    #[test]
    fn unknown_hash_algorithm_errors() {
        let err = HashColumn::from_params(&json!({
            "column_name": "h",
            "source_columns": ["id"],
            "algorithm": "md5"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unsupported hash algorithm"));
    }

    #[test]
    fn add_timestamp_with_fixed_value() {
        let transform = AddTimestamp::from_params(&json!({
            "column_name": "loaded_at",
            "value": "2024-03-01T12:00:00Z"
        }))
        .unwrap();
        let result = transform.apply(&sample_frame()).unwrap();
        let expected = chrono::DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .timestamp_micros();
        assert_eq!(
            result.value("loaded_at", 0).unwrap(),
            ScalarValue::Timestamp(expected)
        );
    }

    #[test]
    fn add_timestamp_defaults_to_now() {
        let transform = AddTimestamp::from_params(&json!({})).unwrap();
        let result = transform.apply(&sample_frame()).unwrap();
        assert!(result.has_column("ingestion_timestamp"));
        assert!(!result.value("ingestion_timestamp", 0).unwrap().is_null());
    }
}
