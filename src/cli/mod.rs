//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{CoordinateCommand, PlanCommand, StepCommand, StoreCommand, ValidateCommand};
use std::ffi::OsString;

/// Pipeline launch planner, coordinator and artifact store tool
#[derive(Debug, Parser, Clone)]
#[command(name = "pipeline-launch")]
#[command(author = "Pipeline Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Compile pipelines into launch plans and dispatch their steps", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Compile a pipeline into its coordinator launch command
    Plan(PlanCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// Coordinator entrypoint: dispatch the steps of a launch plan
    Coordinate(CoordinateCommand),

    /// Worker entrypoint: run a single step
    Step(StepCommand),

    /// Artifact store operations
    Store(StoreCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::StoreAction;

    #[test]
    fn test_parse_coordinator_flags() {
        let cli = Cli::try_parse_from([
            "pipeline-launch",
            "coordinate",
            "--run_name",
            "run-1",
            "--pipeline_name",
            "training",
            "--image_name",
            "img:1",
            "--kubernetes_namespace",
            "ml",
            "--pipeline_config",
            "{\"sorted_steps\":[]}",
            "--dry-run",
            "--max-parallel",
            "2",
        ])
        .unwrap();

        match cli.command {
            Command::Coordinate(cmd) => {
                assert_eq!(cmd.run_name, "run-1");
                assert_eq!(cmd.namespace.as_deref(), Some("ml"));
                assert_eq!(cmd.pipeline_config, "{\"sorted_steps\":[]}");
                assert!(cmd.dry_run);
                assert_eq!(cmd.max_parallel, Some(2));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_worker_flags_in_any_order() {
        let cli = Cli::try_parse_from([
            "pipeline-launch",
            "step",
            "--pipeline_name",
            "training",
            "--step_source",
            "steps.trainer:Trainer",
            "--input_artifact_sources",
            "{\"data\":\"importer.output\"}",
            "--materializer_sources",
            "{}",
            "--run_name",
            "run-1",
        ])
        .unwrap();

        match cli.command {
            Command::Step(cmd) => {
                assert_eq!(cmd.step_source, "steps.trainer:Trainer");
                assert_eq!(cmd.run_name, "run-1");
                assert_eq!(cmd.pipeline_name.as_deref(), Some("training"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_store_subcommand() {
        let cli = Cli::try_parse_from([
            "pipeline-launch",
            "-v",
            "store",
            "cp",
            "file:///tmp/a",
            "file:///tmp/b",
            "--overwrite",
        ])
        .unwrap();
        assert!(cli.verbose);

        match cli.command {
            Command::Store(StoreCommand {
                action: StoreAction::Cp { src, dst, overwrite },
            }) => {
                assert_eq!(src, "file:///tmp/a");
                assert_eq!(dst, "file:///tmp/b");
                assert!(overwrite);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
