//! Test utility functions for pipeline-launch

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pipeline_launch::coordinator::{LaunchError, WorkerLauncher};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Four-step pipeline: `load` feeds `clean` and `stats`, which both feed `train`
pub const DIAMOND_PIPELINE: &str = r#"
name: "diamond"
image: "registry.local/diamond:1"
namespace: "ml"
steps:
  - id: "train"
    source: "steps.train:Train"
    depends_on: ["clean", "stats"]
    inputs:
      features: "clean.output"
      summary: "stats.output"
  - id: "clean"
    source: "steps.clean:Clean"
    depends_on: ["load"]
    inputs:
      raw: "load.output"
  - id: "stats"
    source: "steps.stats:Stats"
    depends_on: ["load"]
    inputs:
      raw: "load.output"
  - id: "load"
    source: "steps.load:Load"
    materializers:
      output: "materializers.csv:Csv"
"#;

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Launcher that records workers, optionally fails chosen steps and keeps
/// track of how many workers ran at the same time
pub struct MockLauncher {
    failing: HashSet<String>,
    delay: Duration,
    launched: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            delay: Duration::from_millis(20),
            launched: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Make the worker of `step` exit with a failure
    pub fn failing(mut self, step: &str) -> Self {
        self.failing.insert(step.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().clone()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().clone()
    }

    /// Highest number of workers observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerLauncher for MockLauncher {
    async fn launch(&self, step: &str, _command: &[String]) -> Result<(), LaunchError> {
        self.launched.lock().push(step.to_string());
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().push(step.to_string());

        if self.failing.contains(step) {
            return Err(LaunchError::Exit {
                step: step.to_string(),
                code: 1,
                stderr: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}
