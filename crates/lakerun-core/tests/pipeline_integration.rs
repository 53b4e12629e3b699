//! End-to-end pipeline execution against the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};

use lakerun_core::config::types::Layer;
use lakerun_core::error::PipelineError;
use lakerun_core::frame::{DataFrame, ScalarValue};
use lakerun_core::pipeline::{Pipeline, PipelineRunner, RunStatus};
use lakerun_core::store::TableStore;
use lakerun_core::{ConfigLoader, MemoryStore, RuntimeContext};

/// 100 rows; `email` holds 3 nulls; `amount` arrives as strings.
fn source_frame() -> DataFrame {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("email", DataType::Utf8, true),
        Field::new("amount", DataType::Utf8, true),
    ]));
    let ids: Vec<i64> = (1..=100).collect();
    let emails: Vec<Option<String>> = (1..=100)
        .map(|i| {
            if i % 33 == 0 {
                None
            } else {
                Some(format!("user{i}@example.com"))
            }
        })
        .collect();
    let amounts: Vec<Option<String>> = (1..=100).map(|i| Some(format!("{i}.50"))).collect();
    DataFrame::new(
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids)) as ArrayRef,
                Arc::new(StringArray::from(emails)) as ArrayRef,
                Arc::new(StringArray::from(amounts)) as ArrayRef,
            ],
        )
        .unwrap(),
    )
}

const PIPELINE_YAML: &str = r#"
pipeline:
  name: customers_silver
  layer: silver
  owner: data-eng
source:
  type: table
  catalog: main
  schema: bronze
  table: customers
transformations:
  - type: cast_columns
    params:
      column_types:
        amount: double
  - type: rename_columns
    params:
      column_mapping:
        email: email_address
  - type: deduplicate
    enabled: false
quality:
  enabled: true
  fail_on_error: false
  checks:
    - type: not_null
      column: email_address
target:
  catalog: main
  schema: silver
  table: customers
  mode: overwrite
"#;

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.register_table("main.bronze.customers", source_frame());
    store
}

#[test]
fn end_to_end_run_produces_expected_metrics() {
    let store = seeded_store();
    let config = lakerun_core::PipelineConfig::from_yaml_str(PIPELINE_YAML).unwrap();
    let mut pipeline = Pipeline::new(config, RuntimeContext::new(), store.clone());

    let metrics = pipeline.run().unwrap();
    assert_eq!(metrics.status, RunStatus::Success);
    assert_eq!(metrics.records_read, 100);
    assert_eq!(metrics.transformations_applied, 2);
    assert_eq!(metrics.quality_checks_passed, 0);
    assert_eq!(metrics.quality_checks_failed, 1);
    assert_eq!(metrics.records_written, 100);
    assert!(metrics.is_terminal());

    let written = store.read_table("main.silver.customers").unwrap();
    assert_eq!(written.num_rows(), 100);
    assert!(written.has_column("email_address"));
    assert_eq!(
        written.value("amount", 0).unwrap(),
        ScalarValue::Float(1.50)
    );
}

#[test]
fn fail_on_error_aborts_with_metrics_snapshot() {
    let store = seeded_store();
    let yaml = PIPELINE_YAML.replace("fail_on_error: false", "fail_on_error: true");
    let config = lakerun_core::PipelineConfig::from_yaml_str(&yaml).unwrap();
    let mut pipeline = Pipeline::new(config, RuntimeContext::new(), store.clone());

    let err = pipeline.run().unwrap_err();
    match err {
        PipelineError::Execution { message, metrics } => {
            assert!(message.contains("not_null_email_address"));
            assert_eq!(metrics.status, RunStatus::Failed);
            assert_eq!(metrics.records_read, 100);
            assert_eq!(metrics.transformations_applied, 2);
            // Nothing reached the target.
            assert_eq!(metrics.records_written, 0);
        }
        other => panic!("expected execution error, got {other}"),
    }
    assert!(store.read_table("main.silver.customers").is_err());
}

#[test]
fn unknown_transform_fails_fast_with_partial_metrics() {
    let store = seeded_store();
    let yaml = PIPELINE_YAML.replace("rename_columns", "explode_columns");
    let config = lakerun_core::PipelineConfig::from_yaml_str(&yaml).unwrap();
    let mut pipeline = Pipeline::new(config, RuntimeContext::new(), store);

    let err = pipeline.run().unwrap_err();
    match err {
        PipelineError::Execution { message, metrics } => {
            assert!(message.contains("unknown transformation type: explode_columns"));
            // The cast before the unknown step still counted.
            assert_eq!(metrics.transformations_applied, 1);
            assert_eq!(metrics.records_read, 100);
        }
        other => panic!("expected execution error, got {other}"),
    }
}

#[test]
fn dry_run_reports_plan_without_writing() {
    let store = seeded_store();
    let config = lakerun_core::PipelineConfig::from_yaml_str(PIPELINE_YAML).unwrap();
    let mut pipeline = Pipeline::new(config, RuntimeContext::new(), store.clone());

    let report = pipeline.dry_run().unwrap();
    assert_eq!(report.pipeline, "customers_silver");
    assert_eq!(report.sources.len(), 1);
    // The disabled deduplicate step is absent from the plan.
    assert_eq!(report.transformations.len(), 2);
    assert_eq!(report.sample.len(), 10);
    assert!(report.target.is_some());
    assert!(store.read_table("main.silver.customers").is_err());
}

#[test]
fn runner_substitutes_widget_params_and_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("customers.yaml");
    std::fs::write(
        &config_path,
        PIPELINE_YAML.replace("catalog: main", "catalog: ${CATALOG_NAME}"),
    )
    .unwrap();

    let store = Arc::new(MemoryStore::new());
    store.register_table("dev_catalog.bronze.customers", source_frame());
    let runner = PipelineRunner::new(dir.path(), RuntimeContext::new(), store.clone());

    let metrics = runner
        .run_pipeline(
            "customers.yaml",
            Some(HashMap::from([(
                "CATALOG_NAME".to_string(),
                "dev_catalog".to_string(),
            )])),
        )
        .unwrap();
    assert_eq!(metrics.status, RunStatus::Success);
    assert!(store.read_table("dev_catalog.silver.customers").is_ok());
}

#[test]
fn run_layer_folds_failures_into_results() {
    let dir = tempfile::tempdir().unwrap();
    let silver = dir.path().join("silver");
    std::fs::create_dir(&silver).unwrap();
    std::fs::write(silver.join("good.yaml"), PIPELINE_YAML).unwrap();
    // Broken pipeline: source table does not exist.
    std::fs::write(
        silver.join("broken.yaml"),
        PIPELINE_YAML
            .replace("name: customers_silver", "name: broken_silver")
            .replace("table: customers", "table: missing"),
    )
    .unwrap();
    // Overlay files are not primary configs.
    std::fs::write(silver.join("good.dev.yaml"), "pipeline:\n  owner: devs\n").unwrap();

    let store = seeded_store();
    let runner = PipelineRunner::new(dir.path(), RuntimeContext::new(), store);

    let results = runner.run_layer(Layer::Silver, false);
    assert_eq!(results.len(), 2);
    let failed: Vec<_> = results
        .iter()
        .filter(|m| m.status == RunStatus::Failed)
        .collect();
    let succeeded: Vec<_> = results
        .iter()
        .filter(|m| m.status == RunStatus::Success)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(succeeded.len(), 1);
    assert_eq!(failed[0].pipeline_name, "broken_silver");
    assert!(failed[0].error_message.is_some());
}

#[test]
fn run_layer_parallel_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let silver = dir.path().join("silver");
    std::fs::create_dir(&silver).unwrap();
    std::fs::write(silver.join("a.yaml"), PIPELINE_YAML).unwrap();
    std::fs::write(
        silver.join("b.yaml"),
        PIPELINE_YAML
            .replace("name: customers_silver", "name: b_silver")
            .replace("table: customers\n  mode: overwrite", "table: b_out\n  mode: overwrite"),
    )
    .unwrap();
    std::fs::write(
        silver.join("c.yaml"),
        PIPELINE_YAML
            .replace("name: customers_silver", "name: c_broken")
            .replace("schema: bronze", "schema: nowhere"),
    )
    .unwrap();

    let store = seeded_store();
    let runner = PipelineRunner::new(dir.path(), RuntimeContext::new(), store);

    let mut results = runner.run_layer(Layer::Silver, true);
    results.sort_by(|a, b| a.pipeline_name.cmp(&b.pipeline_name));
    assert_eq!(results.len(), 3);
    assert_eq!(
        results
            .iter()
            .filter(|m| m.status == RunStatus::Success)
            .count(),
        2
    );
    assert_eq!(results[1].pipeline_name, "c_broken");
    assert_eq!(results[1].status, RunStatus::Failed);
}

#[test]
fn loader_round_trip_with_environment_overlay() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("p.yaml"), PIPELINE_YAML).unwrap();
    std::fs::write(
        dir.path().join("p.qa.yaml"),
        "target:\n  catalog: qa_catalog\n",
    )
    .unwrap();

    let loader = ConfigLoader::new(dir.path()).with_environment("qa");
    let config = loader.load_pipeline_config("p.yaml", None).unwrap();
    assert_eq!(config.target.unwrap().full_table_name(), "qa_catalog.silver.customers");
}
