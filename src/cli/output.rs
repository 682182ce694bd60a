//! CLI output formatting

use crate::coordinator::DispatchEvent;
use crate::store::{EntryKind, PathStat, WalkEntry};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Quote an argument for display when it would not survive a shell as is
fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Format a command line for display
pub fn format_command(command: &[String]) -> String {
    command.iter().map(|arg| quote(arg)).collect::<Vec<_>>().join(" ")
}

/// Format a dispatch event for display
pub fn format_dispatch_event(event: &DispatchEvent) -> String {
    match event {
        DispatchEvent::RunStarted { run_name, steps } => format!(
            "{} Starting run {} ({} steps)",
            ROCKET,
            style(run_name).bold(),
            style(steps).cyan()
        ),
        DispatchEvent::StepLaunched { step, .. } => {
            format!("{} {}", SPINNER, style(step).cyan())
        }
        DispatchEvent::StepSucceeded { step } => format!("{} {}", CHECK, style(step).green()),
        DispatchEvent::StepFailed { step, error } => {
            format!("{} {}: {}", CROSS, style(step).red(), style(error).dim())
        }
    }
}

/// Format path metadata for display
pub fn format_stat(stat: &PathStat) -> String {
    let kind = match stat.kind {
        EntryKind::File => style("file").green(),
        EntryKind::Directory => style("directory").blue(),
    };
    let mut lines = vec![
        format!("  Path: {}", style(&stat.path).bold()),
        format!("  Kind: {}", kind),
        format!("  Size: {}", style(stat.size).cyan()),
    ];
    if let Some(modified) = stat.modified {
        lines.push(format!("  Modified: {}", style(modified.to_rfc3339()).dim()));
    }
    for (key, value) in &stat.extra {
        lines.push(format!("  {}: {}", key, style(value).dim()));
    }
    lines.join("\n")
}

/// Format one visited directory of a walk
pub fn format_walk_entry(entry: &WalkEntry) -> String {
    let mut lines = vec![format!("{}", style(&entry.path).bold())];
    lines.extend(entry.dirs.iter().map(|d| format!("  {}/", style(d).blue())));
    lines.extend(entry.files.iter().map(|f| format!("  {}", f)));
    lines.join("\n")
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
