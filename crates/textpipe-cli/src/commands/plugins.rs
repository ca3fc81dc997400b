use anyhow::{Result, anyhow};
use serde::Serialize;
use textpipe::get_plugin_registry;
use textpipe::plugins::{PluginDescriptor, PluginKind};

use crate::OutputFormat;

#[derive(Serialize)]
struct PluginEntry<'a> {
    kind: PluginKind,
    #[serde(flatten)]
    descriptor: &'a PluginDescriptor,
}

/// Execute the `plugins` command: list registered plugins grouped by category.
pub fn execute(format: OutputFormat) -> Result<()> {
    let registry = get_plugin_registry();
    let registry = registry
        .read()
        .map_err(|e| anyhow!("Plugin registry lock poisoned: {}", e))?;
    let descriptors = registry.descriptors();

    if format == OutputFormat::Json {
        let entries: Vec<_> = descriptors
            .into_iter()
            .map(|(kind, descriptor)| PluginEntry { kind, descriptor })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let mut category: Option<&str> = None;
    for (kind, descriptor) in descriptors {
        if category != Some(descriptor.category.as_str()) {
            println!("{}:", descriptor.category);
            category = Some(descriptor.category.as_str());
        }
        let accepts = if descriptor.input_types.is_empty() {
            "-".to_string()
        } else {
            descriptor.input_types.join("|")
        };
        println!(
            "  {:<18} {:<7} {} -> {}  v{}",
            descriptor.name,
            kind.to_string(),
            accepts,
            if descriptor.output_type.is_empty() {
                "-"
            } else {
                descriptor.output_type.as_str()
            },
            descriptor.version
        );
        if !descriptor.description.is_empty() {
            println!("    {}", descriptor.description);
        }
    }
    Ok(())
}
