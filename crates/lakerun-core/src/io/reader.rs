//! Source dispatch: tables and SQL via the store, files via arrow readers.

use std::fs::File;
use std::io::{BufReader, Seek};
use std::sync::Arc;

use arrow::csv;
use arrow::json;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::config::types::{SourceConfig, SourceKind};
use crate::error::{PipelineError, Result};
use crate::frame::DataFrame;
use crate::store::TableStore;

const DEFAULT_INFER_RECORDS: usize = 1000;

/// Universal reader for configured sources.
pub struct DataReader {
    store: Arc<dyn TableStore>,
}

impl DataReader {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Read a source into a frame.
    ///
    /// # Errors
    ///
    /// Every failure is wrapped as a `Reader` error carrying the source kind.
    pub fn read(&self, source: &SourceConfig) -> Result<DataFrame> {
        let kind = source.kind;
        self.dispatch(source).map_err(|error| match error {
            already @ PipelineError::Reader { .. } => already,
            other => PipelineError::Reader {
                kind: kind.to_string(),
                message: other.to_string(),
            },
        })
    }

    fn dispatch(&self, source: &SourceConfig) -> Result<DataFrame> {
        match source.kind {
            SourceKind::Delta => self.read_delta(source),
            SourceKind::Table => self.read_table(source),
            SourceKind::Parquet => self.read_parquet(source),
            SourceKind::Csv => self.read_csv(source),
            SourceKind::Json => self.read_json(source),
            SourceKind::Jdbc => self.read_jdbc(source),
            SourceKind::Sql => self.read_sql(source),
            SourceKind::Generic => Err(PipelineError::Reader {
                kind: "generic".to_string(),
                message: "generic source formats require a platform reader".to_string(),
            }),
        }
    }

    fn read_delta(&self, source: &SourceConfig) -> Result<DataFrame> {
        if let Some(path) = &source.path {
            tracing::info!(path, "Reading delta source by path");
            return self.store.read_table(path);
        }
        if source.full_table_name().is_some() {
            return self.read_table(source);
        }
        Err(PipelineError::Reader {
            kind: "delta".to_string(),
            message: "delta source requires path or table name".to_string(),
        })
    }

    fn read_table(&self, source: &SourceConfig) -> Result<DataFrame> {
        let table_name = source.full_table_name().ok_or_else(|| PipelineError::Reader {
            kind: "table".to_string(),
            message: "table source requires catalog, schema, and table".to_string(),
        })?;
        tracing::info!(table = table_name, "Reading table source");
        self.store.read_table(&table_name)
    }

    fn require_path<'a>(source: &'a SourceConfig) -> Result<&'a str> {
        source.path.as_deref().ok_or_else(|| PipelineError::Reader {
            kind: source.kind.to_string(),
            message: format!("{} source requires path", source.kind),
        })
    }

    fn read_parquet(&self, source: &SourceConfig) -> Result<DataFrame> {
        let path = Self::require_path(source)?;
        tracing::info!(path, "Reading parquet source");
        let file = File::open(path).map_err(|e| PipelineError::Reader {
            kind: "parquet".to_string(),
            message: format!("cannot open {path}: {e}"),
        })?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| PipelineError::Reader {
                kind: "parquet".to_string(),
                message: e.to_string(),
            })?;
        let schema = builder.schema().clone();
        let reader = builder.build().map_err(|e| PipelineError::Reader {
            kind: "parquet".to_string(),
            message: e.to_string(),
        })?;
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(PipelineError::Arrow)?;
        DataFrame::from_batches(schema, &batches)
    }

    fn read_csv(&self, source: &SourceConfig) -> Result<DataFrame> {
        let path = Self::require_path(source)?;
        tracing::info!(path, "Reading csv source");
        let header = match source.options.get("header") {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => !s.eq_ignore_ascii_case("false"),
            _ => true,
        };
        let mut format = csv::reader::Format::default().with_header(header);
        if let Some(delimiter) = source.option_str("delimiter") {
            if let Some(&byte) = delimiter.as_bytes().first() {
                format = format.with_delimiter(byte);
            }
        }
        let infer_records = source
            .options
            .get("infer_schema_records")
            .and_then(serde_json::Value::as_u64)
            .map_or(DEFAULT_INFER_RECORDS, |n| n as usize);

        let mut file = File::open(path).map_err(|e| PipelineError::Reader {
            kind: "csv".to_string(),
            message: format!("cannot open {path}: {e}"),
        })?;
        let (schema, _) = format.infer_schema(&mut file, Some(infer_records))?;
        file.rewind().map_err(|e| PipelineError::Reader {
            kind: "csv".to_string(),
            message: e.to_string(),
        })?;

        let schema = Arc::new(schema);
        let reader = csv::ReaderBuilder::new(schema.clone())
            .with_format(format)
            .build(file)?;
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(PipelineError::Arrow)?;
        DataFrame::from_batches(schema, &batches)
    }

    fn read_json(&self, source: &SourceConfig) -> Result<DataFrame> {
        let path = Self::require_path(source)?;
        tracing::info!(path, "Reading json source");
        let file = File::open(path).map_err(|e| PipelineError::Reader {
            kind: "json".to_string(),
            message: format!("cannot open {path}: {e}"),
        })?;
        let mut buf_reader = BufReader::new(file);
        let (schema, _) = json::reader::infer_json_schema_from_seekable(&mut buf_reader, None)?;
        buf_reader.rewind().map_err(|e| PipelineError::Reader {
            kind: "json".to_string(),
            message: e.to_string(),
        })?;

        let schema = Arc::new(schema);
        let reader = json::ReaderBuilder::new(schema.clone()).build(buf_reader)?;
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(PipelineError::Arrow)?;
        DataFrame::from_batches(schema, &batches)
    }

    fn read_jdbc(&self, source: &SourceConfig) -> Result<DataFrame> {
        if source.connection_string.is_none() {
            return Err(PipelineError::Reader {
                kind: "jdbc".to_string(),
                message: "jdbc source requires connection_string".to_string(),
            });
        }
        if source.table.is_none() && source.query.is_none() {
            return Err(PipelineError::Reader {
                kind: "jdbc".to_string(),
                message: "jdbc source requires table or query".to_string(),
            });
        }
        tracing::info!("Reading jdbc source");
        self.store.read_jdbc(source)
    }

    fn read_sql(&self, source: &SourceConfig) -> Result<DataFrame> {
        let query = source.query.as_deref().ok_or_else(|| PipelineError::Reader {
            kind: "sql".to_string(),
            message: "sql source requires query".to_string(),
        })?;
        tracing::info!("Executing sql source query");
        self.store.sql(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::io::Write;

    fn source_yaml(yaml: &str) -> SourceConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn reader_with_store() -> (DataReader, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (DataReader::new(store.clone()), store)
    }

    #[test]
    fn csv_reads_with_header_and_inferred_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "id,name,amount").unwrap();
        writeln!(file, "1,alice,10.5").unwrap();
        writeln!(file, "2,bob,20.0").unwrap();

        let (reader, _) = reader_with_store();
        let source = source_yaml(&format!("type: csv\npath: {}", path.display()));
        let frame = reader.read(&source).unwrap();
        assert_eq!(frame.num_rows(), 2);
        assert_eq!(frame.column_names(), vec!["id", "name", "amount"]);
    }

    #[test]
    fn csv_missing_path_errors_with_kind() {
        let (reader, _) = reader_with_store();
        let err = reader.read(&source_yaml("type: csv")).unwrap_err();
        assert!(err.to_string().contains("csv"));
        assert!(err.to_string().contains("requires path"));
    }

    #[test]
    fn json_reads_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{{\"id\": 1, \"name\": \"alice\"}}").unwrap();
        writeln!(file, "{{\"id\": 2, \"name\": \"bob\"}}").unwrap();

        let (reader, _) = reader_with_store();
        let source = source_yaml(&format!("type: json\npath: {}", path.display()));
        let frame = reader.read(&source).unwrap();
        assert_eq!(frame.num_rows(), 2);
    }

    #[test]
    fn table_source_reads_from_store() {
        let (reader, store) = reader_with_store();
        store.register_table(
            "main.raw.users",
            crate::frame::DataFrame::empty(Arc::new(arrow::datatypes::Schema::empty())),
        );
        let source = source_yaml("type: table\ncatalog: main\nschema: raw\ntable: users");
        assert!(reader.read(&source).is_ok());
    }

    #[test]
    fn table_source_without_locator_errors() {
        let (reader, _) = reader_with_store();
        let err = reader.read(&source_yaml("type: table")).unwrap_err();
        assert!(err.to_string().contains("catalog, schema, and table"));
    }

    #[test]
    fn sql_source_runs_against_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "id\n1\n2\n3").unwrap();

        let (reader, store) = reader_with_store();
        let seed = reader
            .read(&source_yaml(&format!("type: csv\npath: {}", path.display())))
            .unwrap();
        store.register_table("seeded", seed);

        let source = source_yaml("type: sql\nquery: SELECT * FROM seeded WHERE id >= 2");
        let frame = reader.read(&source).unwrap();
        assert_eq!(frame.num_rows(), 2);
    }

    #[test]
    fn generic_kind_is_rejected_at_read_time() {
        let (reader, _) = reader_with_store();
        let err = reader
            .read(&source_yaml("type: avro\npath: /data/x.avro"))
            .unwrap_err();
        assert!(err.to_string().contains("generic"));
    }

    #[test]
    fn jdbc_requires_connection_string() {
        let (reader, _) = reader_with_store();
        let err = reader
            .read(&source_yaml("type: jdbc\ntable: users"))
            .unwrap_err();
        assert!(err.to_string().contains("connection_string"));
    }
}
