//! Dispatch scheduler - determines which steps to launch next

use crate::launch::LaunchPlan;
use std::collections::HashMap;

/// Dispatch status of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Failed)
    }
}

/// Tracks step status for one run and hands out steps whose prerequisites
/// have all succeeded
#[derive(Debug, Clone)]
pub struct DispatchScheduler {
    order: Vec<String>,
    dependencies: HashMap<String, Vec<String>>,
    status: HashMap<String, StepStatus>,
    max_parallel: Option<usize>,
}

impl DispatchScheduler {
    pub fn new(plan: &LaunchPlan, max_parallel: Option<usize>) -> Self {
        let dependencies = plan
            .sorted_steps
            .iter()
            .map(|step| (step.clone(), plan.dependencies_of(step).to_vec()))
            .collect();
        let status = plan
            .sorted_steps
            .iter()
            .map(|step| (step.clone(), StepStatus::Pending))
            .collect();

        Self {
            order: plan.sorted_steps.clone(),
            dependencies,
            status,
            // a limit of zero would never launch anything
            max_parallel: max_parallel.map(|max| max.max(1)),
        }
    }

    pub fn status(&self, step: &str) -> Option<StepStatus> {
        self.status.get(step).copied()
    }

    /// Pending steps that may start now, in plan order
    pub fn next_steps(&self) -> Vec<String> {
        let ready = self.order.iter().filter(|step| self.is_ready(step));

        match self.max_parallel {
            Some(max) => {
                let remaining = max.saturating_sub(self.count(StepStatus::Running));
                ready.take(remaining).cloned().collect()
            }
            None => ready.cloned().collect(),
        }
    }

    fn is_ready(&self, step: &str) -> bool {
        self.status(step) == Some(StepStatus::Pending)
            && self.dependencies.get(step).map_or(true, |deps| {
                deps.iter()
                    .all(|dep| self.status(dep) == Some(StepStatus::Succeeded))
            })
    }

    pub fn mark_running(&mut self, step: &str) {
        self.set(step, StepStatus::Running);
    }

    pub fn mark_succeeded(&mut self, step: &str) {
        self.set(step, StepStatus::Succeeded);
    }

    pub fn mark_failed(&mut self, step: &str) {
        self.set(step, StepStatus::Failed);
    }

    fn set(&mut self, step: &str, status: StepStatus) {
        if let Some(current) = self.status.get_mut(step) {
            *current = status;
        }
    }

    fn count(&self, status: StepStatus) -> usize {
        self.status.values().filter(|s| **s == status).count()
    }

    /// Steps with `status`, in plan order
    pub fn steps_with(&self, status: StepStatus) -> Vec<String> {
        self.order
            .iter()
            .filter(|step| self.status(step) == Some(status))
            .cloned()
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.count(StepStatus::Running)
    }

    pub fn has_failed(&self) -> bool {
        self.count(StepStatus::Failed) > 0
    }

    pub fn is_complete(&self) -> bool {
        self.status.values().all(StepStatus::is_terminal)
    }
}
