//! Tabular frame abstraction over arrow record batches.
//!
//! [`DataFrame`] wraps a single `RecordBatch`; every operation returns a new
//! frame. Row-level access goes through [`ScalarValue`], which carries the
//! loose comparison semantics the transform and quality engines rely on
//! (integers and floats compare numerically, nulls compare as unknown).

pub mod expr;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Decimal128Array, Float32Array, Float64Array,
    Int16Array, Int32Array, Int64Array, Int8Array, LargeStringArray, RecordBatch, Scalar,
    StringArray, TimestampMicrosecondArray, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
};
use arrow::compute::kernels::zip::zip;
use arrow::compute::{cast, concat_batches, filter_record_batch, is_null, take};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::util::display::array_value_to_string;

use crate::error::{PipelineError, Result};

const NULL_KEY: &str = "\u{0}null\u{0}";
const KEY_SEPARATOR: char = '\u{1f}';

/// A single cell value lifted out of an arrow column.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Utf8(String),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view; timestamps count as numeric (microseconds).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Timestamp(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Three-valued comparison: `None` when either side is null or the types
    /// are incomparable.
    pub fn compare(&self, other: &Self) -> Option<std::cmp::Ordering> {
        use ScalarValue::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Utf8(a), Utf8(b)) => Some(a.cmp(b)),
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Equality under the loose comparison rules; null never equals anything.
    pub fn loosely_eq(&self, other: &Self) -> bool {
        self.compare(other) == Some(std::cmp::Ordering::Equal)
    }

    /// Convert a JSON parameter value.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::Utf8(s.clone()),
            other => Self::Utf8(other.to_string()),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Utf8(v) => f.write_str(v),
            Self::Timestamp(v) => match chrono::DateTime::from_timestamp_micros(*v) {
                Some(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.6f")),
                None => write!(f, "{v}"),
            },
        }
    }
}

fn decimal128_to_f64(value: i128, scale: i8) -> f64 {
    if scale >= 0 {
        value as f64 / 10f64.powi(i32::from(scale))
    } else {
        value as f64 * 10f64.powi(-i32::from(scale))
    }
}

/// Lift one cell out of an arrow column.
pub fn scalar_value(array: &dyn Array, row: usize) -> ScalarValue {
    if array.is_null(row) {
        return ScalarValue::Null;
    }
    match array.data_type() {
        DataType::Utf8 => array
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|a| ScalarValue::Utf8(a.value(row).to_string())),
        DataType::LargeUtf8 => array
            .as_any()
            .downcast_ref::<LargeStringArray>()
            .map(|a| ScalarValue::Utf8(a.value(row).to_string())),
        DataType::Boolean => array
            .as_any()
            .downcast_ref::<BooleanArray>()
            .map(|a| ScalarValue::Boolean(a.value(row))),
        DataType::Int8 => array
            .as_any()
            .downcast_ref::<Int8Array>()
            .map(|a| ScalarValue::Int(i64::from(a.value(row)))),
        DataType::Int16 => array
            .as_any()
            .downcast_ref::<Int16Array>()
            .map(|a| ScalarValue::Int(i64::from(a.value(row)))),
        DataType::Int32 => array
            .as_any()
            .downcast_ref::<Int32Array>()
            .map(|a| ScalarValue::Int(i64::from(a.value(row)))),
        DataType::Int64 => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|a| ScalarValue::Int(a.value(row))),
        DataType::UInt8 => array
            .as_any()
            .downcast_ref::<UInt8Array>()
            .map(|a| ScalarValue::Int(i64::from(a.value(row)))),
        DataType::UInt16 => array
            .as_any()
            .downcast_ref::<UInt16Array>()
            .map(|a| ScalarValue::Int(i64::from(a.value(row)))),
        DataType::UInt32 => array
            .as_any()
            .downcast_ref::<UInt32Array>()
            .map(|a| ScalarValue::Int(i64::from(a.value(row)))),
        DataType::UInt64 => array
            .as_any()
            .downcast_ref::<UInt64Array>()
            .map(|a| ScalarValue::Int(a.value(row) as i64)),
        DataType::Float32 => array
            .as_any()
            .downcast_ref::<Float32Array>()
            .map(|a| ScalarValue::Float(f64::from(a.value(row)))),
        DataType::Float64 => array
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|a| ScalarValue::Float(a.value(row))),
        // Non-microsecond units go through the display fallback below.
        DataType::Timestamp(TimeUnit::Microsecond, _) => array
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .map(|a| ScalarValue::Timestamp(a.value(row))),
        DataType::Date32 => array
            .as_any()
            .downcast_ref::<Date32Array>()
            .map(|a| ScalarValue::Int(i64::from(a.value(row)))),
        DataType::Decimal128(_, scale) => array
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .map(|a| ScalarValue::Float(decimal128_to_f64(a.value(row), *scale))),
        _ => None,
    }
    .unwrap_or_else(|| {
        ScalarValue::Utf8(array_value_to_string(array, row).unwrap_or_default())
    })
}

/// Printable rendering of one cell, `"null"` for nulls.
pub fn display_value(array: &dyn Array, row: usize) -> String {
    if array.is_null(row) {
        "null".to_string()
    } else {
        array_value_to_string(array, row).unwrap_or_else(|_| "<unprintable>".to_string())
    }
}

/// Build a one-element array of `data_type` holding `value`, for use as a
/// kernel scalar.
pub fn scalar_array(value: &ScalarValue, data_type: &DataType) -> Result<ArrayRef> {
    let natural: ArrayRef = match value {
        ScalarValue::Null => return Ok(arrow::array::new_null_array(data_type, 1)),
        ScalarValue::Boolean(v) => Arc::new(BooleanArray::from(vec![Some(*v)])),
        ScalarValue::Int(v) => Arc::new(Int64Array::from(vec![Some(*v)])),
        ScalarValue::Float(v) => Arc::new(Float64Array::from(vec![Some(*v)])),
        ScalarValue::Utf8(v) => Arc::new(StringArray::from(vec![Some(v.as_str())])),
        ScalarValue::Timestamp(v) => Arc::new(TimestampMicrosecondArray::from(vec![Some(*v)])),
    };
    if natural.data_type() == data_type {
        Ok(natural)
    } else {
        Ok(cast(&natural, data_type)?)
    }
}

/// Build a column from row-wise values, inferring the narrowest common type.
pub fn array_from_scalars(values: &[ScalarValue]) -> Result<ArrayRef> {
    let mut has_float = false;
    let mut has_int = false;
    let mut has_bool = false;
    let mut has_utf8 = false;
    let mut has_timestamp = false;
    for value in values {
        match value {
            ScalarValue::Null => {}
            ScalarValue::Boolean(_) => has_bool = true,
            ScalarValue::Int(_) => has_int = true,
            ScalarValue::Float(_) => has_float = true,
            ScalarValue::Utf8(_) => has_utf8 = true,
            ScalarValue::Timestamp(_) => has_timestamp = true,
        }
    }

    if has_utf8 {
        let rendered: Vec<Option<String>> = values
            .iter()
            .map(|v| (!v.is_null()).then(|| v.to_string()))
            .collect();
        return Ok(Arc::new(StringArray::from(rendered)));
    }
    if has_float {
        let rendered: Vec<Option<f64>> = values.iter().map(ScalarValue::as_f64).collect();
        return Ok(Arc::new(Float64Array::from(rendered)));
    }
    if has_timestamp && !has_int && !has_bool {
        let rendered: Vec<Option<i64>> = values
            .iter()
            .map(|v| match v {
                ScalarValue::Timestamp(t) => Some(*t),
                _ => None,
            })
            .collect();
        return Ok(Arc::new(TimestampMicrosecondArray::from(rendered)));
    }
    if has_int {
        let rendered: Vec<Option<i64>> = values
            .iter()
            .map(|v| match v {
                ScalarValue::Int(i) => Some(*i),
                ScalarValue::Timestamp(t) => Some(*t),
                _ => None,
            })
            .collect();
        return Ok(Arc::new(Int64Array::from(rendered)));
    }
    if has_bool {
        let rendered: Vec<Option<bool>> = values
            .iter()
            .map(|v| match v {
                ScalarValue::Boolean(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Ok(Arc::new(BooleanArray::from(rendered)));
    }
    // All null: a null string column keeps downstream renderers happy.
    Ok(Arc::new(StringArray::from(
        values.iter().map(|_| None::<String>).collect::<Vec<_>>(),
    )))
}

/// Immutable tabular dataset.
#[derive(Debug, Clone)]
pub struct DataFrame {
    batch: RecordBatch,
}

impl DataFrame {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Concatenate batches sharing a schema into one frame.
    ///
    /// # Errors
    ///
    /// Fails when the batches disagree with the schema.
    pub fn from_batches(schema: SchemaRef, batches: &[RecordBatch]) -> Result<Self> {
        if batches.is_empty() {
            return Ok(Self::empty(schema));
        }
        Ok(Self::new(concat_batches(&schema, batches)?))
    }

    pub fn empty(schema: SchemaRef) -> Self {
        Self::new(RecordBatch::new_empty(schema))
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().column_with_name(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.batch.schema().column_with_name(name).map(|(i, _)| i)
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.column_index(name).map(|i| self.batch.column(i))
    }

    fn require_column(&self, name: &str) -> Result<&ArrayRef> {
        self.column(name)
            .ok_or_else(|| PipelineError::Expression(format!("unknown column: {name}")))
    }

    /// Lift one cell.
    ///
    /// # Errors
    ///
    /// Fails on an unknown column.
    pub fn value(&self, column: &str, row: usize) -> Result<ScalarValue> {
        Ok(scalar_value(self.require_column(column)?.as_ref(), row))
    }

    /// Project to the named columns, in order.
    ///
    /// # Errors
    ///
    /// Fails on an unknown column.
    pub fn select(&self, columns: &[String]) -> Result<Self> {
        let schema = self.batch.schema();
        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays = Vec::with_capacity(columns.len());
        for name in columns {
            let (index, field) = schema.column_with_name(name).ok_or_else(|| {
                PipelineError::Transformation(format!("column not found: {name}"))
            })?;
            fields.push(field.clone());
            arrays.push(self.batch.column(index).clone());
        }
        let schema = Arc::new(Schema::new(fields));
        Ok(Self::new(RecordBatch::try_new(schema, arrays)?))
    }

    /// Drop the named columns; names not present are ignored.
    pub fn drop_columns(&self, columns: &[String]) -> Result<Self> {
        let drop: HashSet<&str> = columns.iter().map(String::as_str).collect();
        let keep: Vec<String> = self
            .column_names()
            .into_iter()
            .filter(|name| !drop.contains(name.as_str()))
            .collect();
        self.select(&keep)
    }

    /// Rename one column, keeping its data and position.
    ///
    /// # Errors
    ///
    /// Fails on an unknown column.
    pub fn rename_column(&self, old: &str, new: &str) -> Result<Self> {
        let index = self.column_index(old).ok_or_else(|| {
            PipelineError::Transformation(format!("column not found: {old}"))
        })?;
        let fields: Vec<Field> = self
            .batch
            .schema()
            .fields()
            .iter()
            .enumerate()
            .map(|(i, field)| {
                if i == index {
                    Field::new(new, field.data_type().clone(), field.is_nullable())
                } else {
                    field.as_ref().clone()
                }
            })
            .collect();
        let schema = Arc::new(Schema::new(fields));
        Ok(Self::new(RecordBatch::try_new(
            schema,
            self.batch.columns().to_vec(),
        )?))
    }

    /// Cast one column. Unparseable values become null (safe cast).
    ///
    /// # Errors
    ///
    /// Fails on an unknown column or an unsupported cast.
    pub fn cast_column(&self, name: &str, data_type: &DataType) -> Result<Self> {
        let index = self.column_index(name).ok_or_else(|| {
            PipelineError::Transformation(format!("column not found: {name}"))
        })?;
        let casted = cast(self.batch.column(index), data_type)?;
        let mut arrays = self.batch.columns().to_vec();
        arrays[index] = casted;
        let fields: Vec<Field> = self
            .batch
            .schema()
            .fields()
            .iter()
            .enumerate()
            .map(|(i, field)| {
                if i == index {
                    Field::new(field.name(), data_type.clone(), true)
                } else {
                    field.as_ref().clone()
                }
            })
            .collect();
        Ok(Self::new(RecordBatch::try_new(
            Arc::new(Schema::new(fields)),
            arrays,
        )?))
    }

    /// Replace an existing column or append a new one.
    ///
    /// # Errors
    ///
    /// Fails when the array length does not match the frame.
    pub fn with_column(&self, name: &str, array: ArrayRef) -> Result<Self> {
        if array.len() != self.num_rows() {
            return Err(PipelineError::Transformation(format!(
                "column {name} has {} rows, frame has {}",
                array.len(),
                self.num_rows()
            )));
        }
        let mut fields: Vec<Field> = self
            .batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        let mut arrays = self.batch.columns().to_vec();
        let new_field = Field::new(name, array.data_type().clone(), true);
        match self.column_index(name) {
            Some(index) => {
                fields[index] = new_field;
                arrays[index] = array;
            }
            None => {
                fields.push(new_field);
                arrays.push(array);
            }
        }
        Ok(Self::new(RecordBatch::try_new(
            Arc::new(Schema::new(fields)),
            arrays,
        )?))
    }

    /// Keep rows where the mask is true; null mask slots are excluded.
    pub fn filter_mask(&self, mask: &BooleanArray) -> Result<Self> {
        let strict: BooleanArray = mask.iter().map(|v| Some(v == Some(true))).collect();
        Ok(Self::new(filter_record_batch(&self.batch, &strict)?))
    }

    /// Row selection by index; a null index yields null values in every column.
    pub fn take_indices(&self, indices: &UInt32Array) -> Result<Self> {
        let arrays = self
            .batch
            .columns()
            .iter()
            .map(|column| Ok(take(column.as_ref(), indices, None)?))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(RecordBatch::try_new(self.batch.schema(), arrays)?))
    }

    /// First `n` rows (zero-copy slice).
    pub fn head(&self, n: usize) -> Self {
        Self::new(self.batch.slice(0, n.min(self.num_rows())))
    }

    /// Reorder and cast columns to match `schema` (matched by name).
    ///
    /// # Errors
    ///
    /// Fails when a column required by the schema is missing.
    pub fn align_to(&self, schema: &SchemaRef) -> Result<Self> {
        let mut arrays = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let column = self.column(field.name()).ok_or_else(|| {
                PipelineError::Transformation(format!(
                    "column not found while aligning schemas: {}",
                    field.name()
                ))
            })?;
            let column = if column.data_type() == field.data_type() {
                column.clone()
            } else {
                cast(column.as_ref(), field.data_type())?
            };
            arrays.push(column);
        }
        Ok(Self::new(RecordBatch::try_new(schema.clone(), arrays)?))
    }

    /// Append another frame's rows, aligning its columns to this schema.
    pub fn concat(&self, other: &Self) -> Result<Self> {
        let schema = self.schema();
        let aligned = other.align_to(&schema)?;
        Self::from_batches(schema, &[self.batch.clone(), aligned.batch])
    }

    /// Composite group key over the named columns for one row.
    ///
    /// # Errors
    ///
    /// Fails on an unknown column.
    pub fn group_key(&self, row: usize, columns: &[String]) -> Result<String> {
        let mut key = String::new();
        for (i, name) in columns.iter().enumerate() {
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            let column = self.require_column(name)?;
            if column.is_null(row) {
                key.push_str(NULL_KEY);
            } else {
                key.push_str(&display_value(column.as_ref(), row));
            }
        }
        Ok(key)
    }

    /// Drop exact duplicate rows, optionally scoped to a column subset; the
    /// first occurrence wins and source order is preserved.
    pub fn distinct(&self, subset: Option<&[String]>) -> Result<Self> {
        let columns: Vec<String> = match subset {
            Some(cols) if !cols.is_empty() => cols.to_vec(),
            _ => self.column_names(),
        };
        let mut seen = HashSet::new();
        let mut keep = Vec::new();
        for row in 0..self.num_rows() {
            let key = self.group_key(row, &columns)?;
            if seen.insert(key) {
                keep.push(Some(row as u32));
            }
        }
        self.take_indices(&UInt32Array::from(keep))
    }

    /// Fill nulls in one column with a constant, cast to the column's type.
    ///
    /// # Errors
    ///
    /// Fails on an unknown column or an uncastable fill value.
    pub fn fill_null(&self, column: &str, value: &ScalarValue) -> Result<Self> {
        let array = self.require_column(column)?.clone();
        let fill = scalar_array(value, array.data_type())?;
        let mask = is_null(array.as_ref())?;
        let filled = zip(&mask, &Scalar::new(fill), &array)?;
        self.with_column(column, filled)
    }

    /// Render the first `limit` rows as JSON objects for previews.
    pub fn to_json_rows(&self, limit: usize) -> Vec<serde_json::Value> {
        let schema = self.batch.schema();
        (0..self.num_rows().min(limit))
            .map(|row| {
                let mut object = serde_json::Map::new();
                for (field, column) in schema.fields().iter().zip(self.batch.columns()) {
                    let rendered = if column.is_null(row) {
                        serde_json::Value::Null
                    } else {
                        serde_json::Value::String(display_value(column.as_ref(), row))
                    };
                    object.insert(field.name().clone(), rendered);
                }
                serde_json::Value::Object(object)
            })
            .collect()
    }
}

/// Join flavor for multi-source composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

/// Equality hash join on `keys`. Right-side key columns and any right-side
/// column whose name already exists on the left are dropped from the output.
///
/// # Errors
///
/// Fails when a key column is missing on either side.
pub fn join(left: &DataFrame, right: &DataFrame, keys: &[String], join_type: JoinType) -> Result<DataFrame> {
    if keys.is_empty() {
        return Err(PipelineError::Transformation(
            "join requires at least one key column".to_string(),
        ));
    }
    let mut right_index: HashMap<String, Vec<u32>> = HashMap::new();
    for row in 0..right.num_rows() {
        let key = right.group_key(row, keys)?;
        right_index.entry(key).or_default().push(row as u32);
    }

    let mut left_indices: Vec<Option<u32>> = Vec::new();
    let mut right_indices: Vec<Option<u32>> = Vec::new();
    for row in 0..left.num_rows() {
        let key = left.group_key(row, keys)?;
        match right_index.get(&key) {
            Some(matches) => {
                for &right_row in matches {
                    left_indices.push(Some(row as u32));
                    right_indices.push(Some(right_row));
                }
            }
            None => {
                if join_type == JoinType::Left {
                    left_indices.push(Some(row as u32));
                    right_indices.push(None);
                }
            }
        }
    }

    let left_taken = left.take_indices(&UInt32Array::from(left_indices))?;
    let right_taken = right.take_indices(&UInt32Array::from(right_indices))?;

    let key_set: HashSet<&str> = keys.iter().map(String::as_str).collect();
    let mut fields: Vec<Field> = left_taken
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    let mut arrays = left_taken.batch().columns().to_vec();
    for (field, array) in right_taken
        .schema()
        .fields()
        .iter()
        .zip(right_taken.batch().columns())
    {
        if key_set.contains(field.name().as_str()) || left.has_column(field.name()) {
            continue;
        }
        fields.push(Field::new(field.name(), field.data_type().clone(), true));
        arrays.push(array.clone());
    }
    Ok(DataFrame::new(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        arrays,
    )?))
}

/// Left rows with no key match in `right`.
///
/// # Errors
///
/// Fails when a key column is missing on either side.
pub fn anti_join(left: &DataFrame, right: &DataFrame, keys: &[String]) -> Result<DataFrame> {
    let mut right_keys = HashSet::new();
    for row in 0..right.num_rows() {
        right_keys.insert(right.group_key(row, keys)?);
    }
    let mut mask = Vec::with_capacity(left.num_rows());
    for row in 0..left.num_rows() {
        mask.push(Some(!right_keys.contains(&left.group_key(row, keys)?)));
    }
    left.filter_mask(&BooleanArray::from(mask))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Frame with id (Int64), name (Utf8 nullable), amount (Float64 nullable).
    pub fn sample_frame() -> DataFrame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("amount", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3, 4])) as ArrayRef,
                Arc::new(StringArray::from(vec![
                    Some("alice"),
                    Some("bob"),
                    None,
                    Some("dave"),
                ])) as ArrayRef,
                Arc::new(Float64Array::from(vec![
                    Some(10.0),
                    Some(-5.0),
                    Some(30.0),
                    None,
                ])) as ArrayRef,
            ],
        )
        .expect("batch should build");
        DataFrame::new(batch)
    }
}
