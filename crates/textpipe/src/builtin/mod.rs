//! Built-in plugins.
//!
//! | Name | Kind | Accepts | Produces |
//! |------|------|---------|----------|
//! | `directory-input` | input | | `text` |
//! | `memory-input` | input | | `text` |
//! | `lowercase` | linear | `text`, `tokens` | `text` |
//! | `segmenter` | linear | `text` | `text` |
//! | `tokenizer` | linear | `text` | `tokens` |
//! | `word-count` | linear | `text`, `tokens` | `values` |
//! | `csv-output` | output | `text`, `tokens`, `values` | |
//! | `memory-output` | output | `text`, `tokens`, `values` | |

mod csv_output;
mod directory_input;
mod lowercase;
mod memory_input;
mod memory_output;
mod segmenter;
mod tokenizer;
mod word_count;

pub use csv_output::{CsvFormat, CsvOutput};
pub use directory_input::{DirectoryInput, TextEncoding};
pub use lowercase::Lowercase;
pub use memory_input::MemoryInput;
pub use memory_output::MemoryOutput;
pub use segmenter::Segmenter;
pub use tokenizer::Tokenizer;
pub use word_count::{TOTALS_ORIGIN, WordCount};

use crate::plugins::{PluginDescriptor, PluginRegistry, Stage};
use std::sync::Arc;

const AUTHOR: &str = "Textpipe Contributors";

fn descriptor(
    name: &str,
    category: &str,
    description: &str,
    input_types: &[&str],
    output_type: &str,
) -> PluginDescriptor {
    PluginDescriptor {
        name: name.to_string(),
        category: category.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        author: AUTHOR.to_string(),
        description: description.to_string(),
        tutorial: String::new(),
        top_level: true,
        icon: None,
        input_types: input_types.iter().map(|t| t.to_string()).collect(),
        output_type: output_type.to_string(),
    }
}

/// Register every built-in plugin.
pub(crate) fn register_builtins(registry: &mut PluginRegistry) {
    let factories: [fn() -> Stage; 8] = [
        || Stage::Input(Arc::new(DirectoryInput::new())),
        || Stage::Input(Arc::new(MemoryInput::new())),
        || Stage::Linear(Arc::new(Lowercase::new())),
        || Stage::Linear(Arc::new(Segmenter::new())),
        || Stage::Linear(Arc::new(Tokenizer::new())),
        || Stage::Linear(Arc::new(WordCount::new())),
        || Stage::Output(Arc::new(CsvOutput::new())),
        || Stage::Output(Arc::new(MemoryOutput::new())),
    ];

    for factory in factories {
        if let Err(e) = registry.register(factory) {
            tracing::warn!(error = %e, "Failed to register built-in plugin");
        }
    }
}
