use std::path::Path;

use anyhow::{Context, Result};

use lakerun_core::config::validator;
use lakerun_core::ConfigLoader;

/// Execute the `validate` command: load a configuration, run the strict
/// semantic checks, and print a summary.
pub fn execute(config_path: &Path, environment: &str, base_path: &Path) -> Result<()> {
    let loader = ConfigLoader::new(base_path).with_environment(environment);
    let config = loader
        .load_pipeline_config(config_path, None)
        .with_context(|| format!("failed to load pipeline: {}", config_path.display()))?;

    validator::validate_pipeline(&config)?;

    println!("Pipeline '{}' is valid.", config.name);
    println!("  Layer:       {}", config.layer);
    println!("  Version:     {}", config.version);
    if !config.owner.is_empty() {
        println!("  Owner:       {}", config.owner);
    }
    println!("  Sources:     {}", config.sources.len());
    for (i, transformation) in config.transformations.iter().enumerate() {
        let marker = if transformation.enabled { "" } else { " (disabled)" };
        println!(
            "  Transform {}: {}{marker}",
            i + 1,
            transformation.transform_type
        );
    }
    println!(
        "  Quality:     {} checks, fail_on_error={}",
        config.quality.checks.len(),
        config.quality.fail_on_error
    );
    if let Some(target) = &config.target {
        println!(
            "  Target:      {} ({}, {})",
            target.full_table_name(),
            target.mode,
            target.format
        );
    }
    Ok(())
}
