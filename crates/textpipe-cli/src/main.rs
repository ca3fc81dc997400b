mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "textpipe", version, about = "Concurrent text-processing pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline
    Run {
        /// Pipeline file (.toml, .yaml, .yml, .json); defaults to the nearest textpipe.toml
        config: Option<PathBuf>,
        /// Override the global worker-thread budget
        #[arg(long)]
        max_threads: Option<usize>,
        /// Override the output ordering (input or arrival)
        #[arg(long)]
        ordering: Option<textpipe::OutputOrdering>,
        /// Abort on the first failing item
        #[arg(long)]
        fail_fast: bool,
        /// Summary format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate a pipeline without reading input or writing output
    Check {
        /// Pipeline file; defaults to the nearest textpipe.toml
        config: Option<PathBuf>,
    },
    /// List available plugins
    Plugins {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            max_threads,
            ordering,
            fail_fast,
            format,
        } => {
            let overrides = commands::run::Overrides {
                max_threads,
                ordering,
                fail_fast,
            };
            commands::run::execute(config.as_deref(), overrides, format).await
        }
        Commands::Check { config } => commands::check::execute(config.as_deref()),
        Commands::Plugins { format } => commands::plugins::execute(format),
    }
}
