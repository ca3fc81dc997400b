pub mod check;
pub mod plugins;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use textpipe::{Pipeline, PipelineConfig, get_plugin_registry};

/// Load the pipeline config from `path`, or discover `textpipe.toml`.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load pipeline: {}", path.display())),
        None => PipelineConfig::discover()?
            .ok_or_else(|| anyhow!("No pipeline file given and no textpipe.toml found")),
    }
}

/// Build a pipeline from its config using the global registry.
pub fn build_pipeline(config: &PipelineConfig) -> Result<Pipeline> {
    let registry = get_plugin_registry();
    let registry = registry
        .read()
        .map_err(|e| anyhow!("Plugin registry lock poisoned: {}", e))?;
    Ok(registry.build_pipeline(config)?)
}
