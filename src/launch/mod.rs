//! Launch planning - turns a compiled pipeline into coordinator and worker
//! command lines

pub mod args;
pub mod entrypoint;
pub mod plan;

pub use args::{partition_args, PartitionedArgs, VolatileOptions};
pub use entrypoint::{
    compile, generate_run_name, CoordinatorEntrypointConfiguration, LaunchCommand,
    StepEntrypointConfiguration,
};
pub use plan::{LaunchPlan, LaunchPlanBuilder, PlanError};
