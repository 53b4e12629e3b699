//! Pipeline orchestration: read, transform, validate, write.

pub mod metrics;

pub use metrics::{PipelineMetrics, RunStatus};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use crate::config::loader::ConfigLoader;
use crate::config::types::{Layer, PipelineConfig};
use crate::context::RuntimeContext;
use crate::error::{PipelineError, Result};
use crate::frame::{join, DataFrame, JoinType};
use crate::io::{DataReader, DataWriter};
use crate::quality;
use crate::store::TableStore;
use crate::transform::{Transform, TransformRegistry};

/// Execution plan and sample data produced without writing anything.
#[derive(Debug, Serialize)]
pub struct DryRunReport {
    pub pipeline: String,
    pub layer: String,
    pub sources: Vec<JsonValue>,
    pub transformations: Vec<JsonValue>,
    pub target: Option<JsonValue>,
    pub sample: Vec<JsonValue>,
}

/// One configured pipeline, ready to execute.
///
/// Owns its configuration and metrics for the duration of a run; the
/// transform registry is seeded with the built-ins and extensible through
/// [`Pipeline::register_transform`].
pub struct Pipeline {
    config: PipelineConfig,
    context: RuntimeContext,
    store: Arc<dyn TableStore>,
    registry: TransformRegistry,
    metrics: PipelineMetrics,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, context: RuntimeContext, store: Arc<dyn TableStore>) -> Self {
        let metrics = PipelineMetrics::new(&config.name);
        Self {
            config,
            context,
            store,
            registry: TransformRegistry::with_builtins(),
            metrics,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    /// Register a custom transform constructor under a config type tag.
    pub fn register_transform<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&JsonValue) -> Result<Box<dyn Transform>> + Send + Sync + 'static,
    {
        self.registry.register(name, factory);
    }

    /// Execute the pipeline and return the terminal metrics.
    ///
    /// # Errors
    ///
    /// Any failure finalizes the metrics as failed and surfaces as
    /// [`PipelineError::Execution`] carrying the snapshot.
    pub fn run(&mut self) -> Result<PipelineMetrics> {
        tracing::info!(
            pipeline = self.config.name,
            layer = %self.config.layer,
            environment = self.context.environment(),
            "Starting pipeline"
        );
        self.metrics = PipelineMetrics::new(&self.config.name);

        match self.execute() {
            Ok(()) => {
                self.metrics.complete(RunStatus::Success, None);
                tracing::info!(
                    pipeline = self.config.name,
                    duration_secs = self.metrics.duration_seconds,
                    "Pipeline completed successfully"
                );
                Ok(self.metrics.clone())
            }
            Err(error) => {
                let message = error.to_string();
                self.metrics.complete(RunStatus::Failed, Some(message.clone()));
                tracing::error!(pipeline = self.config.name, error = %message, "Pipeline failed");
                Err(PipelineError::Execution {
                    message,
                    metrics: Box::new(self.metrics.clone()),
                })
            }
        }
    }

    fn execute(&mut self) -> Result<()> {
        let frame = self.read_sources()?;
        self.metrics.records_read = frame.num_rows() as u64;
        tracing::info!(records = self.metrics.records_read, "Read records from source");

        let frame = self.apply_transformations(frame)?;
        let frame = self.run_quality_checks(frame)?;

        if let Some(target) = &self.config.target {
            let writer = DataWriter::new(self.store.clone());
            self.metrics.records_written = writer.write(&frame, target)?;
            tracing::info!(
                records = self.metrics.records_written,
                table = target.full_table_name(),
                "Wrote records to target"
            );
        }
        Ok(())
    }

    fn read_sources(&self) -> Result<DataFrame> {
        let reader = DataReader::new(self.store.clone());
        match self.config.sources.len() {
            0 => Err(PipelineError::Configuration(
                "no source configured for pipeline".to_string(),
            )),
            1 => reader.read(&self.config.sources[0]),
            _ => {
                let frames = self
                    .config
                    .sources
                    .iter()
                    .map(|source| reader.read(source))
                    .collect::<Result<Vec<_>>>()?;
                self.join_sources(frames)
            }
        }
    }

    fn join_sources(&self, frames: Vec<DataFrame>) -> Result<DataFrame> {
        let join_config = self.config.parameters.get("join");
        let join_type = match join_config
            .and_then(|j| j.get("type"))
            .and_then(JsonValue::as_str)
            .unwrap_or("inner")
        {
            "inner" => JoinType::Inner,
            "left" => JoinType::Left,
            other => {
                return Err(PipelineError::Configuration(format!(
                    "unsupported join type: {other}"
                )))
            }
        };
        let keys: Vec<String> = join_config
            .and_then(|j| j.get("keys"))
            .and_then(JsonValue::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if keys.is_empty() {
            return Err(PipelineError::Configuration(
                "join keys must be specified for multi-source pipelines".to_string(),
            ));
        }

        let mut frames = frames.into_iter();
        let mut result = frames.next().ok_or_else(|| {
            PipelineError::Configuration("no source configured for pipeline".to_string())
        })?;
        for frame in frames {
            result = join(&result, &frame, &keys, join_type)?;
        }
        Ok(result)
    }

    fn apply_transformations(&mut self, frame: DataFrame) -> Result<DataFrame> {
        let mut frame = frame;
        for step in &self.config.transformations {
            if !step.enabled {
                tracing::info!(
                    transform = step.transform_type,
                    "Skipping disabled transformation"
                );
                continue;
            }
            let transform = self.registry.build(&step.transform_type, &step.params)?;
            tracing::info!(transform = step.transform_type, "Applying transformation");
            frame = transform.apply(&frame)?;
            self.metrics.transformations_applied += 1;
        }
        Ok(frame)
    }

    fn run_quality_checks(&mut self, frame: DataFrame) -> Result<DataFrame> {
        if !self.config.quality.enabled {
            return Ok(frame);
        }
        let report = quality::run_checks(
            &frame,
            &self.config.quality.checks,
            self.config.quality.fail_on_error,
        )?;
        self.metrics.quality_checks_passed = report.passed;
        self.metrics.quality_checks_failed = report.failed;
        Ok(frame)
    }

    /// Build the execution plan and a sample without touching the write path.
    ///
    /// # Errors
    ///
    /// Fails on source read or transform errors.
    pub fn dry_run(&mut self) -> Result<DryRunReport> {
        tracing::info!(pipeline = self.config.name, "Dry run");
        let mut report = DryRunReport {
            pipeline: self.config.name.clone(),
            layer: self.config.layer.to_string(),
            sources: Vec::new(),
            transformations: Vec::new(),
            target: None,
            sample: Vec::new(),
        };

        if !self.config.sources.is_empty() {
            let reader = DataReader::new(self.store.clone());
            let mut frame = reader.read(&self.config.sources[0])?;
            report.sources = self
                .config
                .sources
                .iter()
                .map(|source| {
                    json!({
                        "type": source.kind.to_string(),
                        "table": source.full_table_name().or_else(|| source.path.clone()),
                    })
                })
                .collect();

            for step in &self.config.transformations {
                if !step.enabled {
                    continue;
                }
                report.transformations.push(json!({
                    "type": step.transform_type,
                    "params": step.params,
                }));
                // Unknown types are reported in the plan but not applied.
                if self.registry.contains(&step.transform_type) {
                    let transform = self.registry.build(&step.transform_type, &step.params)?;
                    frame = transform.apply(&frame)?;
                }
            }
            report.sample = frame.to_json_rows(10);
        }

        if let Some(target) = &self.config.target {
            report.target = Some(json!({
                "table": target.full_table_name(),
                "mode": target.mode.to_string(),
                "format": target.format,
            }));
        }
        Ok(report)
    }
}

/// Runs pipelines from a configuration directory.
pub struct PipelineRunner {
    loader: ConfigLoader,
    context: RuntimeContext,
    store: Arc<dyn TableStore>,
}

impl PipelineRunner {
    pub fn new(
        config_base_path: impl Into<PathBuf>,
        context: RuntimeContext,
        store: Arc<dyn TableStore>,
    ) -> Self {
        let loader =
            ConfigLoader::new(config_base_path).with_environment(context.environment().to_string());
        Self {
            loader,
            context,
            store,
        }
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    /// Load and run a single pipeline.
    ///
    /// # Errors
    ///
    /// Configuration errors surface directly; run failures surface as
    /// [`PipelineError::Execution`].
    pub fn run_pipeline(
        &self,
        config_path: impl AsRef<Path>,
        widget_params: Option<HashMap<String, String>>,
    ) -> Result<PipelineMetrics> {
        let mut loader = self.loader.clone();
        loader.set_widget_params(widget_params.unwrap_or_default());
        let config = loader.load_pipeline_config(config_path, None)?;
        let mut pipeline = Pipeline::new(config, self.context.clone(), self.store.clone());
        pipeline.run()
    }

    fn collect_run(&self, config_path: &Path) -> Option<PipelineMetrics> {
        match self.run_pipeline(config_path, None) {
            Ok(metrics) => Some(metrics),
            Err(error) => {
                tracing::error!(
                    config = %config_path.display(),
                    error = %error,
                    "Pipeline failed"
                );
                error.metrics().cloned()
            }
        }
    }

    /// Run every primary config in a layer. One pipeline's failure never
    /// halts the batch: failed runs contribute their terminal metrics to the
    /// result list.
    pub fn run_layer(&self, layer: Layer, parallel: bool) -> Vec<PipelineMetrics> {
        let configs = self.loader.list_configs(Some(layer), "*.yaml");
        tracing::info!(
            layer = %layer,
            pipelines = configs.len(),
            parallel,
            "Running layer"
        );

        if parallel {
            std::thread::scope(|scope| {
                let handles: Vec<_> = configs
                    .iter()
                    .map(|path| scope.spawn(move || self.collect_run(path)))
                    .collect();
                handles
                    .into_iter()
                    .filter_map(|handle| handle.join().unwrap_or(None))
                    .collect()
            })
        } else {
            configs
                .iter()
                .filter_map(|path| self.collect_run(path))
                .collect()
        }
    }
}
