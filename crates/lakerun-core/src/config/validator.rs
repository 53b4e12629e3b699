//! Semantic validation for bound pipeline configurations.
//!
//! The engine itself validates at point of use (fail-late); this pass is the
//! strict front door used by `lakerun validate`, collecting every problem
//! into one error. It also rejects unknown quality-check types, which the
//! check engine deliberately lets pass.

use crate::config::types::{PipelineConfig, SourceKind, WriteMode};
use crate::error::{PipelineError, Result};
use crate::quality::KNOWN_CHECK_TYPES;

/// Validate a bound pipeline configuration.
///
/// # Errors
///
/// Returns a configuration error listing every problem found.
pub fn validate_pipeline(config: &PipelineConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    if config.sources.is_empty() {
        errors.push("pipeline defines no source".to_string());
    }

    for (index, source) in config.sources.iter().enumerate() {
        let label = format!("source {index} ({})", source.kind);
        match source.kind {
            SourceKind::Jdbc => {
                if source.connection_string.is_none() {
                    errors.push(format!("{label} requires connection_string"));
                }
                if source.table.is_none() && source.query.is_none() {
                    errors.push(format!("{label} requires table or query"));
                }
            }
            SourceKind::Sql => {
                if source.query.is_none() {
                    errors.push(format!("{label} requires query"));
                }
            }
            SourceKind::Parquet | SourceKind::Csv | SourceKind::Json => {
                if source.path.is_none() {
                    errors.push(format!("{label} requires path"));
                }
            }
            SourceKind::Table => {
                if source.full_table_name().is_none() {
                    errors.push(format!("{label} requires catalog, schema, and table"));
                }
            }
            SourceKind::Delta => {
                if source.path.is_none() && source.full_table_name().is_none() {
                    errors.push(format!("{label} requires path or table name"));
                }
            }
            SourceKind::Generic => {
                errors.push(format!("{label} has an unrecognized source type"));
            }
        }
    }

    if let Some(target) = &config.target {
        if matches!(target.mode, WriteMode::Merge | WriteMode::Scd2)
            && target.merge_keys.is_empty()
        {
            errors.push(format!(
                "target mode '{}' requires at least one merge key",
                target.mode
            ));
        }
    }

    match config.processing.mode.as_str() {
        "full" => {}
        "incremental" => {
            if config.processing.watermark_column.is_none() {
                errors.push(
                    "incremental processing requires a watermark_column".to_string(),
                );
            }
        }
        other => errors.push(format!("unknown processing mode: {other}")),
    }

    for check in &config.quality.checks {
        if !KNOWN_CHECK_TYPES.contains(&check.check_type.as_str()) {
            errors.push(format!(
                "unknown quality check type: {}",
                check.check_type
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Configuration(format!(
            "pipeline validation failed:\n  - {}",
            errors.join("\n  - ")
        )))
    }
}
