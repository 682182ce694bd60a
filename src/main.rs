use anyhow::{bail, Context, Result};
use pipeline_launch::cli::commands::{
    CoordinateCommand, PlanCommand, StepCommand, StoreAction, StoreCommand, ValidateCommand,
};
use pipeline_launch::cli::output::*;
use pipeline_launch::cli::{Cli, Command};
use pipeline_launch::coordinator::{
    Coordinator, CoordinatorError, DispatchEvent, DryRunLauncher, SubprocessLauncher,
    WorkerLauncher,
};
use pipeline_launch::core::config::PipelineConfig;
use pipeline_launch::launch::{compile, generate_run_name, LaunchPlan};
use pipeline_launch::store::{OpenMode, PathStore, StoreRegistry};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Plan(cmd) => plan_pipeline(cmd)?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Coordinate(cmd) => coordinate(cmd).await?,
        Command::Step(cmd) => run_step(cmd)?,
        Command::Store(cmd) => store_command(cmd)?,
    }

    Ok(())
}

fn load_config(file: &str) -> Result<PipelineConfig> {
    PipelineConfig::from_file(file).with_context(|| format!("Failed to load pipeline config {}", file))
}

fn plan_pipeline(cmd: &PlanCommand) -> Result<()> {
    let pipeline = load_config(&cmd.file)?.to_pipeline();

    let run_name = cmd
        .run_name
        .clone()
        .or_else(|| pipeline.run_name.clone())
        .unwrap_or_else(|| generate_run_name(&pipeline.name));

    let launch = compile(&pipeline, &run_name).context("Failed to compile launch plan")?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&launch.plan)?);
        return Ok(());
    }

    println!(
        "{} Compiled pipeline {} as run {}",
        INFO,
        style(&pipeline.name).bold(),
        style(&launch.run_name).cyan()
    );
    println!("  Steps: {}", style(launch.plan.sorted_steps.join(" → ")).cyan());
    println!(
        "  Shared arguments: {}",
        style(launch.plan.fixed_step_args.len()).cyan()
    );
    println!("\n{}", format_command(&launch.command_line()));

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            let pipeline = config.to_pipeline();
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Image: {}", style(&config.image).cyan());
            println!("  Namespace: {}", style(&config.namespace).cyan());
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!("  Order: {}", style(pipeline.execution_order().join(" → ")).dim());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

async fn coordinate(cmd: &CoordinateCommand) -> Result<()> {
    let plan = LaunchPlan::from_json(&cmd.pipeline_config).context("Failed to decode launch plan")?;

    info!(
        run_name = %cmd.run_name,
        pipeline = ?cmd.pipeline_name,
        image = ?cmd.image_name,
        namespace = ?cmd.namespace,
        "Coordinator started"
    );

    let started = Instant::now();
    let result = if cmd.dry_run {
        let mut coordinator = configure(Coordinator::new(DryRunLauncher::new()), cmd);
        coordinator.add_event_handler(|event| match event {
            DispatchEvent::StepLaunched { command, .. } => println!("{}", format_command(command)),
            other => println!("{}", format_dispatch_event(other)),
        });
        coordinator.run(&plan, &cmd.run_name).await
    } else {
        let program = match &cmd.worker_binary {
            Some(program) => program.clone(),
            None => std::env::current_exe()
                .context("Failed to locate the current executable")?
                .display()
                .to_string(),
        };
        let mut launcher = SubprocessLauncher::new().with_program(program);
        if let Some(secs) = cmd.worker_timeout {
            launcher = launcher.with_timeout(secs);
        }

        let progress = create_progress_bar(plan.sorted_steps.len());
        let mut coordinator = configure(Coordinator::new(launcher), cmd);
        let bar = progress.clone();
        coordinator.add_event_handler(move |event| {
            match event {
                DispatchEvent::StepLaunched { step, .. } => bar.set_message(step.clone()),
                DispatchEvent::StepSucceeded { .. } | DispatchEvent::StepFailed { .. } => bar.inc(1),
                DispatchEvent::RunStarted { .. } => {}
            }
            bar.println(format_dispatch_event(event));
        });

        let result = coordinator.run(&plan, &cmd.run_name).await;
        progress.finish_and_clear();
        result
    };

    match result {
        Ok(report) => {
            println!(
                "\n{} Run {} completed {} in {}",
                CHECK,
                style(&report.run_name).bold(),
                style("successfully").green(),
                style(format_duration(started.elapsed())).dim()
            );
            Ok(())
        }
        Err(CoordinatorError::StepsFailed { failed, skipped }) => {
            println!(
                "\n{} Run {} {}",
                CROSS,
                style(&cmd.run_name).bold(),
                style("failed").red()
            );
            println!("  Failed: {}", style(failed.join(", ")).red());
            if !skipped.is_empty() {
                println!("  {} Not launched: {}", WARN, style(skipped.join(", ")).dim());
            }
            std::process::exit(1);
        }
        Err(e) => Err(e).context("Coordinator run failed"),
    }
}

fn configure<L: WorkerLauncher + 'static>(
    coordinator: Coordinator<L>,
    cmd: &CoordinateCommand,
) -> Coordinator<L> {
    match cmd.max_parallel {
        Some(max) => coordinator.with_max_parallel(max),
        None => coordinator,
    }
}

fn run_step(cmd: &StepCommand) -> Result<()> {
    let inputs: BTreeMap<String, String> = serde_json::from_str(&cmd.input_artifact_sources)
        .context("Invalid --input_artifact_sources")?;
    let materializers: BTreeMap<String, String> = serde_json::from_str(&cmd.materializer_sources)
        .context("Invalid --materializer_sources")?;

    info!(
        step_source = %cmd.step_source,
        run_name = %cmd.run_name,
        pipeline = ?cmd.pipeline_name,
        inputs = inputs.len(),
        materializers = materializers.len(),
        "Step worker started"
    );
    for (name, source) in &inputs {
        debug!(input = %name, source = %source, "Resolved input artifact");
    }
    for (name, source) in &materializers {
        debug!(output = %name, materializer = %source, "Resolved materializer");
    }

    println!(
        "{} {} ({})",
        CHECK,
        style(&cmd.step_source).green(),
        style(&cmd.run_name).dim()
    );
    Ok(())
}

fn store_command(cmd: &StoreCommand) -> Result<()> {
    let registry = StoreRegistry::with_defaults();
    let store_for = |path: &str| -> Result<Arc<dyn PathStore>> {
        registry
            .for_path(path)
            .with_context(|| format!("No store for {}", path))
    };

    match &cmd.action {
        StoreAction::Ls { path } => {
            let store = store_for(path)?;
            for name in store.listdir(path)? {
                println!("{}", name);
            }
        }
        StoreAction::Cat { path } => {
            let mut file = store_for(path)?.open(path, OpenMode::Read)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            io::copy(&mut file, &mut out).with_context(|| format!("Failed to read {}", path))?;
            out.flush()?;
        }
        StoreAction::Put { path, from } => {
            let mut file = store_for(path)?.open(path, OpenMode::Write)?;
            let written = match from {
                Some(local) => {
                    let mut source = std::fs::File::open(local)
                        .with_context(|| format!("Failed to open {}", local.display()))?;
                    io::copy(&mut source, &mut file)?
                }
                None => io::copy(&mut io::stdin().lock(), &mut file)?,
            };
            file.close()?;
            println!("{} Wrote {} bytes to {}", CHECK, style(written).cyan(), style(path).bold());
        }
        StoreAction::Cp { src, dst, overwrite } => {
            let source = store_for(src)?;
            let target = store_for(dst)?;
            if source.schemes() == target.schemes() {
                source.copyfile(src, dst, *overwrite)?;
            } else {
                // streamed copy between two backends
                if !*overwrite && target.exists(dst)? {
                    bail!("Destination already exists: {}", dst);
                }
                let mut reader = source.open(src, OpenMode::Read)?;
                let mut writer = target.open(dst, OpenMode::Write)?;
                io::copy(&mut reader, &mut writer)?;
                writer.close()?;
            }
            println!("{} {} → {}", CHECK, style(src).dim(), style(dst).bold());
        }
        StoreAction::Mv { src, dst, overwrite } => {
            let source = store_for(src)?;
            if source.schemes() != store_for(dst)?.schemes() {
                bail!("Cannot move between stores: {} → {}", src, dst);
            }
            source.rename(src, dst, *overwrite)?;
            println!("{} {} → {}", CHECK, style(src).dim(), style(dst).bold());
        }
        StoreAction::Rm { path } => store_for(path)?.remove(path)?,
        StoreAction::Rmtree { path } => store_for(path)?.rmtree(path)?,
        StoreAction::Mkdir { path } => store_for(path)?.mkdir(path)?,
        StoreAction::Makedirs { path } => store_for(path)?.makedirs(path)?,
        StoreAction::Glob { pattern } => {
            for path in store_for(pattern)?.glob(pattern)? {
                println!("{}", path);
            }
        }
        StoreAction::Walk { top } => {
            let store = store_for(top)?;
            for entry in store.walk(top) {
                println!("{}", format_walk_entry(&entry?));
            }
        }
        StoreAction::Stat { path, json } => {
            let stat = store_for(path)?.stat(path)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&stat)?);
            } else {
                println!("{}", format_stat(&stat));
            }
        }
    }

    Ok(())
}
