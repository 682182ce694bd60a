//! Coordinator engine - fans a launch plan out to step workers

use crate::coordinator::launcher::{LaunchError, WorkerLauncher};
use crate::coordinator::scheduler::{DispatchScheduler, StepStatus};
use crate::launch::{LaunchPlan, PlanError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Error types for a coordinator run
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("Steps failed: {}", failed.join(", "))]
    StepsFailed {
        failed: Vec<String>,
        /// Steps never launched because the run stopped
        skipped: Vec<String>,
    },

    #[error("No runnable steps left, stuck on: {}", pending.join(", "))]
    Stalled { pending: Vec<String> },

    #[error("Worker task aborted: {0}")]
    Aborted(String),
}

/// Events emitted while dispatching a run
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    RunStarted {
        run_name: String,
        steps: usize,
    },
    StepLaunched {
        step: String,
        command: Vec<String>,
    },
    StepSucceeded {
        step: String,
    },
    StepFailed {
        step: String,
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&DispatchEvent) + Send + Sync>;

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub run_name: String,
    /// Steps in the order they finished
    pub completed: Vec<String>,
}

/// Launches every step of a plan once its prerequisites have succeeded
pub struct Coordinator<L> {
    launcher: Arc<L>,
    max_parallel: Option<usize>,
    event_handlers: Vec<EventHandler>,
}

impl<L: WorkerLauncher + 'static> Coordinator<L> {
    pub fn new(launcher: L) -> Self {
        Self::with_shared_launcher(Arc::new(launcher))
    }

    /// Coordinator using a launcher the caller keeps a handle to
    pub fn with_shared_launcher(launcher: Arc<L>) -> Self {
        Self {
            launcher,
            max_parallel: None,
            event_handlers: Vec::new(),
        }
    }

    /// Limit the number of concurrently running workers
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel);
        self
    }

    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&DispatchEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    fn emit(&self, event: DispatchEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Dispatch every step of `plan` for `run_name`.
    ///
    /// Once a worker fails no further steps are launched; workers already
    /// running are awaited before the run reports its failure.
    pub async fn run(&self, plan: &LaunchPlan, run_name: &str) -> Result<DispatchReport, CoordinatorError> {
        plan.validate()?;

        info!(run_name, steps = plan.sorted_steps.len(), "Starting coordinator run");
        self.emit(DispatchEvent::RunStarted {
            run_name: run_name.to_string(),
            steps: plan.sorted_steps.len(),
        });

        // every command is built before the first worker starts
        let mut commands = plan
            .sorted_steps
            .iter()
            .map(|step| {
                plan.worker_command(step, run_name)
                    .map(|command| (step.clone(), command))
            })
            .collect::<Result<HashMap<_, _>, PlanError>>()?;

        let mut scheduler = DispatchScheduler::new(plan, self.max_parallel);
        let mut workers: JoinSet<(String, Result<(), LaunchError>)> = JoinSet::new();
        let mut completed = Vec::with_capacity(plan.sorted_steps.len());

        loop {
            if !scheduler.has_failed() {
                for step in scheduler.next_steps() {
                    let Some(command) = commands.remove(&step) else {
                        continue;
                    };
                    scheduler.mark_running(&step);
                    self.emit(DispatchEvent::StepLaunched {
                        step: step.clone(),
                        command: command.clone(),
                    });

                    let launcher = Arc::clone(&self.launcher);
                    workers.spawn(async move {
                        let result = launcher.launch(&step, &command).await;
                        (step, result)
                    });
                }
            }

            let Some(joined) = workers.join_next().await else {
                break;
            };

            match joined {
                Ok((step, Ok(()))) => {
                    info!(step = %step, "Step succeeded");
                    scheduler.mark_succeeded(&step);
                    self.emit(DispatchEvent::StepSucceeded { step: step.clone() });
                    completed.push(step);
                }
                Ok((step, Err(e))) => {
                    error!(step = %step, "Step failed: {}", e);
                    scheduler.mark_failed(&step);
                    self.emit(DispatchEvent::StepFailed {
                        step,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    workers.shutdown().await;
                    return Err(CoordinatorError::Aborted(e.to_string()));
                }
            }
        }

        if scheduler.has_failed() {
            let skipped = scheduler.steps_with(StepStatus::Pending);
            if !skipped.is_empty() {
                warn!(run_name, skipped = ?skipped, "Steps not launched after failure");
            }
            return Err(CoordinatorError::StepsFailed {
                failed: scheduler.steps_with(StepStatus::Failed),
                skipped,
            });
        }

        if !scheduler.is_complete() {
            let pending = scheduler.steps_with(StepStatus::Pending);
            error!(run_name, "No steps ready to run and none running - run stuck");
            return Err(CoordinatorError::Stalled { pending });
        }

        info!(run_name, "Coordinator run completed");
        Ok(DispatchReport {
            run_name: run_name.to_string(),
            completed,
        })
    }
}
