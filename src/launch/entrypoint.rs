//! Entrypoint configurations for coordinator and worker processes
//!
//! These define the command lines the scheduler backend receives: the
//! coordinator is started once per run with the serialized launch plan, and
//! starts one worker per step.

use crate::core::{Pipeline, Step};
use crate::launch::args::{
    option, INPUT_ARTIFACT_SOURCES_OPTION, MATERIALIZER_SOURCES_OPTION, STEP_SOURCE_OPTION,
};
use crate::launch::plan::{LaunchPlan, LaunchPlanBuilder, PlanError};
use chrono::Utc;
use std::collections::HashMap;
use tracing::info;

/// Name of the binary every entrypoint runs
pub const ENTRYPOINT_BINARY: &str = "pipeline-launch";

pub const RUN_NAME_OPTION: &str = "run_name";
pub const PIPELINE_NAME_OPTION: &str = "pipeline_name";
pub const IMAGE_NAME_OPTION: &str = "image_name";
pub const NAMESPACE_OPTION: &str = "kubernetes_namespace";
pub const PIPELINE_CONFIG_OPTION: &str = "pipeline_config";

/// Produces the full argument list of a single step worker
#[derive(Debug, Clone)]
pub struct StepEntrypointConfiguration {
    pub pipeline_name: String,
    pub run_name: String,
}

impl StepEntrypointConfiguration {
    pub fn new(pipeline_name: impl Into<String>, run_name: impl Into<String>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            run_name: run_name.into(),
        }
    }

    /// Command that runs a step worker
    pub fn command() -> Vec<String> {
        vec![ENTRYPOINT_BINARY.to_string(), "step".to_string()]
    }

    /// Options a step worker is started with
    pub fn entrypoint_options() -> [&'static str; 5] {
        [
            STEP_SOURCE_OPTION,
            INPUT_ARTIFACT_SOURCES_OPTION,
            MATERIALIZER_SOURCES_OPTION,
            PIPELINE_NAME_OPTION,
            RUN_NAME_OPTION,
        ]
    }

    /// All arguments for `step`, step-specific options first
    pub fn arguments(&self, step: &Step) -> Result<Vec<String>, PlanError> {
        Ok(vec![
            option(STEP_SOURCE_OPTION),
            step.source.clone(),
            option(INPUT_ARTIFACT_SOURCES_OPTION),
            serde_json::to_string(&step.inputs)?,
            option(MATERIALIZER_SOURCES_OPTION),
            serde_json::to_string(&step.materializers)?,
            option(PIPELINE_NAME_OPTION),
            self.pipeline_name.clone(),
            option(RUN_NAME_OPTION),
            self.run_name.clone(),
        ])
    }
}

/// Builds the launch command of the coordinator process
pub struct CoordinatorEntrypointConfiguration;

impl CoordinatorEntrypointConfiguration {
    /// Command that runs the coordinator
    pub fn command() -> Vec<String> {
        vec![ENTRYPOINT_BINARY.to_string(), "coordinate".to_string()]
    }

    /// Options the coordinator is started with
    pub fn entrypoint_options() -> [&'static str; 5] {
        [
            RUN_NAME_OPTION,
            PIPELINE_NAME_OPTION,
            IMAGE_NAME_OPTION,
            NAMESPACE_OPTION,
            PIPELINE_CONFIG_OPTION,
        ]
    }

    /// Coordinator arguments, with the plan carried as one JSON value
    pub fn arguments(
        run_name: &str,
        pipeline_name: &str,
        image_name: &str,
        namespace: &str,
        plan: &LaunchPlan,
    ) -> Result<Vec<String>, PlanError> {
        Ok(vec![
            option(RUN_NAME_OPTION),
            run_name.to_string(),
            option(PIPELINE_NAME_OPTION),
            pipeline_name.to_string(),
            option(IMAGE_NAME_OPTION),
            image_name.to_string(),
            option(NAMESPACE_OPTION),
            namespace.to_string(),
            option(PIPELINE_CONFIG_OPTION),
            plan.to_json()?,
        ])
    }
}

/// Everything needed to submit one pipeline run
#[derive(Debug, Clone)]
pub struct LaunchCommand {
    pub run_name: String,
    pub command: Vec<String>,
    pub arguments: Vec<String>,
    pub plan: LaunchPlan,
}

impl LaunchCommand {
    /// Command followed by its arguments
    pub fn command_line(&self) -> Vec<String> {
        self.command.iter().chain(&self.arguments).cloned().collect()
    }
}

/// Default run name: pipeline name plus submission timestamp
pub fn generate_run_name(pipeline_name: &str) -> String {
    format!("{}-{}", pipeline_name, Utc::now().format("%d_%b_%y-%H_%M_%S_%6f"))
}

/// Compile a pipeline into the coordinator launch command for one run
pub fn compile(pipeline: &Pipeline, run_name: &str) -> Result<LaunchCommand, PlanError> {
    let step_config = StepEntrypointConfiguration::new(&pipeline.name, run_name);
    let sorted_steps = pipeline.execution_order().to_vec();

    // produce every step's arguments up front so encoding errors surface here
    let mut step_args = HashMap::with_capacity(sorted_steps.len());
    for step in pipeline.sorted_steps() {
        step_args.insert(step.id.clone(), step_config.arguments(step)?);
    }

    let plan = LaunchPlanBuilder::new(StepEntrypointConfiguration::command()).build(
        &sorted_steps,
        &pipeline.dependency_map(),
        |step| step_args.get(step).cloned().unwrap_or_default(),
    )?;

    let arguments = CoordinatorEntrypointConfiguration::arguments(
        run_name,
        &pipeline.name,
        &pipeline.image,
        &pipeline.namespace,
        &plan,
    )?;

    info!(
        pipeline = %pipeline.name,
        run_name,
        steps = plan.sorted_steps.len(),
        "Compiled coordinator launch command"
    );

    Ok(LaunchCommand {
        run_name: run_name.to_string(),
        command: CoordinatorEntrypointConfiguration::command(),
        arguments,
        plan,
    })
}
