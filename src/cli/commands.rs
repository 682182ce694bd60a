//! CLI command definitions

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Compile a pipeline
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Run name; defaults to the configured one or a generated one
    #[arg(long)]
    pub run_name: Option<String>,

    /// Print the launch plan document instead of the command line
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Coordinator entrypoint
#[derive(Debug, Args, Clone)]
pub struct CoordinateCommand {
    #[arg(long = "run_name")]
    pub run_name: String,

    #[arg(long = "pipeline_name")]
    pub pipeline_name: Option<String>,

    #[arg(long = "image_name")]
    pub image_name: Option<String>,

    #[arg(long = "kubernetes_namespace")]
    pub namespace: Option<String>,

    /// Launch plan JSON document
    #[arg(long = "pipeline_config")]
    pub pipeline_config: String,

    /// Print worker commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of concurrently running workers
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Per-worker timeout in seconds
    #[arg(long)]
    pub worker_timeout: Option<u64>,

    /// Worker executable; defaults to the current binary
    #[arg(long)]
    pub worker_binary: Option<String>,
}

/// Worker entrypoint
#[derive(Debug, Args, Clone)]
pub struct StepCommand {
    #[arg(long = "step_source")]
    pub step_source: String,

    /// Input name -> artifact source, as JSON
    #[arg(long = "input_artifact_sources", default_value = "{}")]
    pub input_artifact_sources: String,

    /// Output name -> materializer source, as JSON
    #[arg(long = "materializer_sources", default_value = "{}")]
    pub materializer_sources: String,

    #[arg(long = "pipeline_name")]
    pub pipeline_name: Option<String>,

    #[arg(long = "run_name")]
    pub run_name: String,
}

/// Artifact store operations
#[derive(Debug, Args, Clone)]
pub struct StoreCommand {
    #[command(subcommand)]
    pub action: StoreAction,
}

#[derive(Debug, Subcommand, Clone)]
pub enum StoreAction {
    /// List a directory
    Ls { path: String },

    /// Print a file to stdout
    Cat { path: String },

    /// Write stdin or a local file to a path
    Put {
        path: String,

        /// Local file to upload instead of stdin
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Copy a file
    Cp {
        src: String,
        dst: String,
        #[arg(long)]
        overwrite: bool,
    },

    /// Move a file or directory
    Mv {
        src: String,
        dst: String,
        #[arg(long)]
        overwrite: bool,
    },

    /// Remove a file
    Rm { path: String },

    /// Remove a directory recursively
    Rmtree { path: String },

    /// Create a directory whose parent exists
    Mkdir { path: String },

    /// Create a directory and its ancestors
    Makedirs { path: String },

    /// List paths matching a pattern
    Glob { pattern: String },

    /// Walk a directory tree
    Walk { top: String },

    /// Show metadata of a path
    Stat {
        path: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}
