//! Pipeline construction and type-chain validation.
//!
//! A [`Pipeline`] is an Input stage, zero or more Linear stages and an Output
//! stage. Building one checks that every stage accepts what its predecessor
//! produces; nothing is opened, read or written during construction.

use crate::core::config::{EngineConfig, PipelineConfig, StageConfig};
use crate::core::header::resolve_header;
use crate::plugins::{InputPlugin, LinearPlugin, OutputPlugin, Plugin, Stage};
use crate::types::Header;
use crate::{Result, TextpipeError};
use std::sync::Arc;

/// Human-readable label for the stage at `position`.
pub fn stage_label(position: usize, stage: &Stage) -> String {
    format!("stage {} '{}' ({})", position, stage.name(), stage.kind())
}

/// Check that the output tag of every stage is accepted by the next one.
///
/// # Errors
///
/// `TextpipeError::Configuration` naming the offending stage pair.
pub fn validate_type_chain(stages: &[Stage]) -> Result<()> {
    for (position, pair) in stages.windows(2).enumerate() {
        let (upstream, downstream) = (&pair[0], &pair[1]);
        let produced = &upstream.descriptor().output_type;
        if !downstream.descriptor().accepts(produced) {
            return Err(TextpipeError::configuration(
                format!(
                    "{} -> {}",
                    stage_label(position, upstream),
                    stage_label(position + 1, downstream)
                ),
                format!(
                    "'{}' produces '{}' but '{}' accepts [{}]",
                    upstream.name(),
                    produced,
                    downstream.name(),
                    downstream.descriptor().input_types.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

/// A validated, ready-to-run pipeline.
pub struct Pipeline {
    input: Arc<dyn InputPlugin>,
    linear: Vec<Arc<dyn LinearPlugin>>,
    output: Arc<dyn OutputPlugin>,
    engine: EngineConfig,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn input(&self) -> &Arc<dyn InputPlugin> {
        &self.input
    }

    pub fn linear(&self) -> &[Arc<dyn LinearPlugin>] {
        &self.linear
    }

    pub fn output(&self) -> &Arc<dyn OutputPlugin> {
        &self.output
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    /// Replace the engine settings (e.g. CLI overrides).
    pub fn set_engine(&mut self, engine: EngineConfig) -> Result<()> {
        engine.validate()?;
        self.engine = engine;
        Ok(())
    }

    /// All stages in order: input, linear chain, output.
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages = Vec::with_capacity(self.linear.len() + 2);
        stages.push(Stage::Input(Arc::clone(&self.input)));
        stages.extend(self.linear.iter().map(|p| Stage::Linear(Arc::clone(p))));
        stages.push(Stage::Output(Arc::clone(&self.output)));
        stages
    }

    /// The header the output will carry, as the stages declare it right now.
    ///
    /// A run resolves it again after every stage has been initialized.
    pub fn effective_header(&self) -> Header {
        resolve_header(self.linear.iter().map(|p| p.as_ref() as &dyn Plugin))
    }

    /// Run every stage's settings check, in stage order.
    ///
    /// # Errors
    ///
    /// The first failure, as `TextpipeError::Configuration` naming the stage.
    pub fn inspect_settings(&self) -> Result<()> {
        for (position, stage) in self.stages().iter().enumerate() {
            if let Err(e) = stage.plugin().inspect_settings() {
                return Err(TextpipeError::configuration(stage_label(position, stage), e.to_string()));
            }
        }
        Ok(())
    }

    /// Export the pipeline (engine settings plus every stage's settings).
    pub fn export_config(&self, suppress_warnings: bool) -> PipelineConfig {
        let export = |plugin: &dyn Plugin| StageConfig {
            plugin: plugin.name().to_string(),
            settings: plugin.export_settings(suppress_warnings),
        };
        PipelineConfig {
            engine: self.engine.clone(),
            input: export(self.input.as_ref()),
            linear: self.linear.iter().map(|p| export(p.as_ref())).collect(),
            output: export(self.output.as_ref()),
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages())
            .field("engine", &self.engine)
            .finish()
    }
}

/// Assembles a [`Pipeline`].
///
/// ```rust
/// use std::sync::Arc;
/// use textpipe::builtin::{MemoryInput, MemoryOutput, WordCount};
/// use textpipe::Pipeline;
///
/// let pipeline = Pipeline::builder()
///     .input(Arc::new(MemoryInput::from_texts(["one two", "three"])))
///     .linear(Arc::new(WordCount::new()))
///     .output(Arc::new(MemoryOutput::new()))
///     .build()
///     .unwrap();
/// assert_eq!(pipeline.stages().len(), 3);
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    input: Option<Arc<dyn InputPlugin>>,
    linear: Vec<Arc<dyn LinearPlugin>>,
    output: Option<Arc<dyn OutputPlugin>>,
    engine: EngineConfig,
}

impl PipelineBuilder {
    pub fn input(mut self, input: Arc<dyn InputPlugin>) -> Self {
        self.input = Some(input);
        self
    }

    /// Append a Linear stage.
    pub fn linear(mut self, stage: Arc<dyn LinearPlugin>) -> Self {
        self.linear.push(stage);
        self
    }

    pub fn output(mut self, output: Arc<dyn OutputPlugin>) -> Self {
        self.output = Some(output);
        self
    }

    /// Place a stage according to its variant.
    pub fn stage(self, stage: Stage) -> Self {
        match stage {
            Stage::Input(p) => self.input(p),
            Stage::Linear(p) => self.linear(p),
            Stage::Output(p) => self.output(p),
        }
    }

    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// `TextpipeError::Configuration` when the input or output is missing, the
    /// engine settings are invalid or two adjacent stages are incompatible.
    pub fn build(self) -> Result<Pipeline> {
        self.engine.validate()?;

        let input = self
            .input
            .ok_or_else(|| TextpipeError::pipeline_configuration("pipeline has no input stage"))?;
        let output = self
            .output
            .ok_or_else(|| TextpipeError::pipeline_configuration("pipeline has no output stage"))?;

        let pipeline = Pipeline {
            input,
            linear: self.linear,
            output,
            engine: self.engine,
        };
        validate_type_chain(&pipeline.stages())?;
        Ok(pipeline)
    }
}
