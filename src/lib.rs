//! pipeline-launch - launch plans for pipeline runs and a path-addressed
//! artifact store for the workers they start

pub mod cli;
pub mod coordinator;
pub mod core;
pub mod launch;
pub mod store;

// Re-export commonly used types
pub use crate::coordinator::{Coordinator, CoordinatorError, DispatchReport, WorkerLauncher};
pub use crate::core::{config::PipelineConfig, Pipeline, Step};
pub use crate::launch::{compile, LaunchCommand, LaunchPlan, LaunchPlanBuilder, PlanError};
pub use crate::store::{OpenMode, PathStore, StoreError, StoreRegistry};
