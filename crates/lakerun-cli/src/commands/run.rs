use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use lakerun_core::config::validator;
use lakerun_core::pipeline::PipelineMetrics;
use lakerun_core::{ConfigLoader, MemoryStore, Pipeline, RuntimeContext};

/// Execute the `run` command: load, validate, and run a pipeline.
///
/// Real deployments inject their platform's `TableStore` through the library
/// API; the CLI runs against the in-memory backend, which covers file-based
/// sources and dry runs.
pub fn execute(
    config_path: &Path,
    environment: &str,
    dry_run: bool,
    catalog_override: Option<&str>,
    base_path: &Path,
) -> Result<()> {
    let catalog = catalog_override
        .map(str::to_string)
        .unwrap_or_else(|| default_catalog(environment));
    let widget_params = HashMap::from([
        ("ENVIRONMENT".to_string(), environment.to_string()),
        ("CATALOG_NAME".to_string(), catalog),
    ]);

    let loader = ConfigLoader::new(base_path)
        .with_environment(environment)
        .with_widget_params(widget_params);
    let config = loader
        .load_pipeline_config(config_path, None)
        .with_context(|| format!("failed to load pipeline: {}", config_path.display()))?;
    validator::validate_pipeline(&config)?;

    tracing::info!(
        pipeline = config.name,
        layer = %config.layer,
        environment,
        transformations = config.transformations.len(),
        quality_checks = config.quality.checks.len(),
        "Pipeline validated"
    );

    let pipeline_name = config.name.clone();
    let run_id = generate_run_id();
    let store = Arc::new(MemoryStore::new());
    let context = RuntimeContext::new().with_environment(environment);
    let mut pipeline = Pipeline::new(config, context, store);

    if dry_run {
        let report = pipeline.dry_run()?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        print_result(&pipeline_name, environment, "dry_run", 0, 0.0, &run_id);
        return Ok(());
    }

    match pipeline.run() {
        Ok(metrics) => {
            print_summary(&metrics);
            print_result(
                &pipeline_name,
                environment,
                "success",
                metrics.records_written,
                metrics.duration_seconds,
                &run_id,
            );
            Ok(())
        }
        Err(error) => {
            if let Some(metrics) = error.metrics() {
                print_result(
                    &pipeline_name,
                    environment,
                    "failed",
                    metrics.records_written,
                    metrics.duration_seconds,
                    &run_id,
                );
            }
            Err(error.into())
        }
    }
}

fn default_catalog(environment: &str) -> String {
    match environment {
        "dev" => "dev_catalog",
        "qa" => "qa_catalog",
        "prd" => "prd_catalog",
        _ => "main",
    }
    .to_string()
}

fn generate_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
}

fn print_summary(metrics: &PipelineMetrics) {
    println!("Pipeline '{}' completed successfully.", metrics.pipeline_name);
    println!("  Records read:    {}", metrics.records_read);
    println!("  Records written: {}", metrics.records_written);
    println!("  Transforms:      {}", metrics.transformations_applied);
    println!(
        "  Quality checks:  {} passed, {} failed",
        metrics.quality_checks_passed, metrics.quality_checks_failed
    );
    println!("  Duration:        {:.2}s", metrics.duration_seconds);
}

fn print_result(
    pipeline_name: &str,
    environment: &str,
    status: &str,
    records_written: u64,
    duration_seconds: f64,
    run_id: &str,
) {
    let result = serde_json::json!({
        "pipeline_name": pipeline_name,
        "environment": environment,
        "status": status,
        "records_written": records_written,
        "duration_seconds": duration_seconds,
        "run_id": run_id,
    });
    println!("{result}");
}
