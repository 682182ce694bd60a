//! Step domain model

use crate::core::config::StepConfig;
use std::collections::BTreeMap;

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Source reference of the step implementation
    pub source: String,

    /// Input name -> artifact source
    pub inputs: BTreeMap<String, String>,

    /// Output name -> materializer source
    pub materializers: BTreeMap<String, String>,

    /// List of step IDs this step depends on
    pub dependencies: Vec<String>,
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig) -> Self {
        Step {
            id: config.id.clone(),
            source: config.source.clone(),
            inputs: config.inputs.clone(),
            materializers: config.materializers.clone(),
            dependencies: config.depends_on.clone(),
        }
    }
}
