use std::path::Path;

use anyhow::Result;

use lakerun_core::config::types::Layer;
use lakerun_core::ConfigLoader;

/// Execute the `list` command: print primary configuration files, sorted,
/// with environment overlays excluded.
pub fn execute(layer: Option<&str>, base_path: &Path) -> Result<()> {
    let layer = layer.map(Layer::parse).transpose()?;
    let loader = ConfigLoader::new(base_path);
    let configs = loader.list_configs(layer, "*.yaml");

    if configs.is_empty() {
        println!("No pipeline configurations found.");
        return Ok(());
    }
    for config in configs {
        let display = config
            .strip_prefix(base_path)
            .unwrap_or(config.as_path())
            .display();
        println!("{display}");
    }
    Ok(())
}
