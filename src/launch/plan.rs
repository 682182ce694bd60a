//! Launch plan - the single document a coordinator needs to run a pipeline
//!
//! The plan carries the full graph (step order and dependencies) but ships
//! every invariant option only once in `fixed_step_args`. Each worker gets
//! the fixed arguments plus its own entry of `step_specific_args`, so the
//! document grows with the number of steps times the number of volatile
//! options instead of the full argument count.

use crate::launch::args::{self, partition_args, VolatileOptions};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::debug;

use super::entrypoint::RUN_NAME_OPTION;

/// Configuration errors raised while building or decoding a launch plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Cannot build a launch plan for a pipeline without steps")]
    EmptyPipeline,

    #[error("Duplicate step ID: {0}")]
    DuplicateStep(String),

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Unknown step '{0}'")]
    UnknownStep(String),

    #[error("Step '{0}' has no entry in step_specific_args")]
    MissingStepArgs(String),

    #[error(
        "Step '{step}' has fixed arguments {actual:?} but step '{reference}' has {expected:?}"
    )]
    InconsistentFixedArgs {
        step: String,
        reference: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Launch plan JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialized unit handed to the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchPlan {
    /// Step IDs in execution order
    pub sorted_steps: Vec<String>,

    /// Command every worker process runs
    pub step_command: Vec<String>,

    /// Option/value pairs shared by every step
    pub fixed_step_args: Vec<String>,

    /// Step ID -> option/value pairs only that step receives
    pub step_specific_args: BTreeMap<String, Vec<String>>,

    /// Step ID -> steps that need to finish before it
    pub step_dependencies: BTreeMap<String, Vec<String>>,
}

impl LaunchPlan {
    /// Encode as a single-line JSON document
    pub fn to_json(&self) -> Result<String, PlanError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a plan and check its references
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        let plan: LaunchPlan = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check that the plan is non-empty, only references its own steps and
    /// carries an argument slice for every step
    pub fn validate(&self) -> Result<(), PlanError> {
        let known = check_steps(&self.sorted_steps, &self.step_dependencies)?;
        for step in self.step_specific_args.keys() {
            if !known.contains(step.as_str()) {
                return Err(PlanError::UnknownStep(step.clone()));
            }
        }
        if let Some(step) = self
            .sorted_steps
            .iter()
            .find(|step| !self.step_specific_args.contains_key(step.as_str()))
        {
            return Err(PlanError::MissingStepArgs(step.clone()));
        }
        Ok(())
    }

    /// Prerequisites of `step`
    pub fn dependencies_of(&self, step: &str) -> &[String] {
        self.step_dependencies
            .get(step)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Arguments for the worker running `step`.
    ///
    /// Fixed arguments come first with any run-name pair stripped, then the
    /// step's own slice, then the run name the worker belongs to.
    pub fn worker_arguments(&self, step: &str, run_name: &str) -> Result<Vec<String>, PlanError> {
        let specific = self
            .step_specific_args
            .get(step)
            .ok_or_else(|| PlanError::UnknownStep(step.to_string()))?;

        let mut arguments = args::remove_option(&self.fixed_step_args, RUN_NAME_OPTION);
        arguments.extend(specific.iter().cloned());
        arguments.push(args::option(RUN_NAME_OPTION));
        arguments.push(run_name.to_string());
        Ok(arguments)
    }

    /// Full command line for the worker running `step`
    pub fn worker_command(&self, step: &str, run_name: &str) -> Result<Vec<String>, PlanError> {
        let mut command = self.step_command.clone();
        command.extend(self.worker_arguments(step, run_name)?);
        Ok(command)
    }
}

/// Check step uniqueness and dependency references, returning the known IDs
fn check_steps<'a>(
    sorted_steps: &'a [String],
    step_dependencies: &BTreeMap<String, Vec<String>>,
) -> Result<HashSet<&'a str>, PlanError> {
    if sorted_steps.is_empty() {
        return Err(PlanError::EmptyPipeline);
    }

    let mut known = HashSet::with_capacity(sorted_steps.len());
    for step in sorted_steps {
        if !known.insert(step.as_str()) {
            return Err(PlanError::DuplicateStep(step.clone()));
        }
    }

    for (step, dependencies) in step_dependencies {
        if !known.contains(step.as_str()) {
            return Err(PlanError::UnknownStep(step.clone()));
        }
        if let Some(dependency) = dependencies.iter().find(|d| !known.contains(d.as_str())) {
            return Err(PlanError::UnknownDependency {
                step: step.clone(),
                dependency: dependency.clone(),
            });
        }
    }

    Ok(known)
}

/// Builds a [`LaunchPlan`] from ordered steps and their argument lists
#[derive(Debug, Clone)]
pub struct LaunchPlanBuilder {
    step_command: Vec<String>,
    volatile: VolatileOptions,
    verify_fixed_args: bool,
}

impl LaunchPlanBuilder {
    pub fn new(step_command: Vec<String>) -> Self {
        Self {
            step_command,
            volatile: VolatileOptions::default(),
            verify_fixed_args: true,
        }
    }

    pub fn with_volatile_options(mut self, volatile: VolatileOptions) -> Self {
        self.volatile = volatile;
        self
    }

    /// Toggle the check that every step agrees on its fixed arguments.
    ///
    /// With the check off, the first step's fixed arguments are used for all
    /// steps and any disagreement is lost.
    pub fn verify_fixed_args(mut self, verify: bool) -> Self {
        self.verify_fixed_args = verify;
        self
    }

    /// Build the plan.
    ///
    /// `sorted_steps` must already be in a valid topological order.
    /// `step_args` returns the full argument list of a step and must be
    /// stable across calls for the same step.
    pub fn build<F>(
        &self,
        sorted_steps: &[String],
        step_dependencies: &BTreeMap<String, Vec<String>>,
        mut step_args: F,
    ) -> Result<LaunchPlan, PlanError>
    where
        F: FnMut(&str) -> Vec<String>,
    {
        check_steps(sorted_steps, step_dependencies)?;

        let reference = &sorted_steps[0];
        let mut fixed_step_args: Option<Vec<String>> = None;
        let mut step_specific_args = BTreeMap::new();

        for step in sorted_steps {
            let parts = partition_args(&step_args(step), &self.volatile);
            match &fixed_step_args {
                None => fixed_step_args = Some(parts.fixed),
                Some(expected) if self.verify_fixed_args && *expected != parts.fixed => {
                    return Err(PlanError::InconsistentFixedArgs {
                        step: step.clone(),
                        reference: reference.clone(),
                        expected: expected.clone(),
                        actual: parts.fixed,
                    });
                }
                Some(_) => {}
            }
            step_specific_args.insert(step.clone(), parts.step_specific);
        }

        let fixed_step_args = fixed_step_args.unwrap_or_default();
        debug!(
            steps = sorted_steps.len(),
            fixed_args = fixed_step_args.len(),
            "Built launch plan"
        );

        Ok(LaunchPlan {
            sorted_steps: sorted_steps.to_vec(),
            step_command: self.step_command.clone(),
            fixed_step_args,
            step_specific_args,
            step_dependencies: step_dependencies.clone(),
        })
    }
}
