//! The stage sum type.

use crate::plugins::{InputPlugin, LinearPlugin, OutputPlugin, Plugin, PluginDescriptor, PluginKind};
use std::sync::Arc;

/// One plugin instance in one of the three pipeline positions.
#[derive(Clone)]
pub enum Stage {
    Input(Arc<dyn InputPlugin>),
    Linear(Arc<dyn LinearPlugin>),
    Output(Arc<dyn OutputPlugin>),
}

impl Stage {
    pub fn kind(&self) -> PluginKind {
        match self {
            Stage::Input(_) => PluginKind::Input,
            Stage::Linear(_) => PluginKind::Linear,
            Stage::Output(_) => PluginKind::Output,
        }
    }

    /// The shared capability interface.
    pub fn plugin(&self) -> &dyn Plugin {
        match self {
            Stage::Input(p) => p.as_ref(),
            Stage::Linear(p) => p.as_ref(),
            Stage::Output(p) => p.as_ref(),
        }
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        self.plugin().descriptor()
    }

    pub fn name(&self) -> &str {
        self.plugin().name()
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}
