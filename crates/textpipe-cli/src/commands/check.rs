use std::path::Path;

use anyhow::Result;

/// Execute the `check` command: type chain and settings, no input or output access.
pub fn execute(config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;

    let pipeline = super::build_pipeline(&config)?;
    println!("Type chain:        OK");

    pipeline.inspect_settings()?;
    println!("Stage settings:    OK");

    for (position, stage) in pipeline.stages().iter().enumerate() {
        let descriptor = stage.descriptor();
        println!(
            "  {:>2}. {:<18} {:<7} -> {}",
            position,
            descriptor.name,
            stage.kind().to_string(),
            if descriptor.output_type.is_empty() {
                "-"
            } else {
                descriptor.output_type.as_str()
            }
        );
    }

    let header = pipeline.effective_header();
    if !header.is_empty() {
        let columns: Vec<_> = header.values().map(String::as_str).collect();
        println!("Header columns:    {}", columns.join(", "));
    }
    println!("Thread budget:     {}", pipeline.engine().thread_budget());

    println!("\nAll checks passed.");
    Ok(())
}
