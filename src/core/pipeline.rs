//! Pipeline domain model

use crate::core::{config::PipelineConfig, step::Step};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A compiled pipeline definition
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Container image reference
    pub image: String,

    /// Scheduling namespace
    pub namespace: String,

    /// Run name pinned in the configuration, if any
    pub run_name: Option<String>,

    /// Pipeline steps
    pub steps: HashMap<String, Step>,

    /// Step execution order (topological sort)
    execution_order: Vec<String>,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let steps: HashMap<String, Step> = config
            .steps
            .iter()
            .map(|step_config| {
                let step = Step::from_config(step_config);
                (step.id.clone(), step)
            })
            .collect();

        let execution_order = Self::topological_sort(&steps);

        Pipeline {
            name: config.name.clone(),
            image: config.image.clone(),
            namespace: config.namespace.clone(),
            run_name: config.run_name.clone(),
            steps,
            execution_order,
        }
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.get(id)
    }

    /// Get execution order (topological sort)
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Steps in execution order
    pub fn sorted_steps(&self) -> Vec<&Step> {
        self.execution_order
            .iter()
            .filter_map(|id| self.steps.get(id))
            .collect()
    }

    /// For each step, the steps that need to finish before it starts
    pub fn dependency_map(&self) -> BTreeMap<String, Vec<String>> {
        self.steps
            .values()
            .map(|s| (s.id.clone(), s.dependencies.clone()))
            .collect()
    }

    /// Calculate topological sort of steps based on dependencies
    fn topological_sort(steps: &HashMap<String, Step>) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();

        // Sort for deterministic order
        let mut step_ids: Vec<_> = steps.keys().cloned().collect();
        step_ids.sort();

        for step_id in step_ids {
            if !visited.contains(&step_id) {
                Self::visit(&step_id, steps, &mut visited, &mut result);
            }
        }

        result
    }

    fn visit(
        step_id: &str,
        steps: &HashMap<String, Step>,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if !visited.insert(step_id.to_string()) {
            return;
        }

        if let Some(step) = steps.get(step_id) {
            for dep in &step.dependencies {
                Self::visit(dep, steps, visited, result);
            }
        }

        result.push(step_id.to_string());
    }
}
