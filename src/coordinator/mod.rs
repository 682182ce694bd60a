//! Coordinator - runs a launch plan by starting one worker per step

pub mod engine;
pub mod launcher;
pub mod scheduler;

pub use engine::{Coordinator, CoordinatorError, DispatchEvent, DispatchReport};
pub use launcher::{DryRunLauncher, LaunchError, SubprocessLauncher, WorkerLauncher};
pub use scheduler::{DispatchScheduler, StepStatus};
