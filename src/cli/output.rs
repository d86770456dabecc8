//! CLI output formatting

use crate::core::{RunReport, RunStatus, StepResult, StepStatus};
use crate::execution::RunnerEvent;
use crate::persistence::RunSummary;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over the pipeline's steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a step status for display
pub fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Skipped => style("SKIPPED").dim().to_string(),
        StepStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        StepStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format a run status for display
pub fn format_run_status(status: RunStatus) -> String {
    match status {
        RunStatus::Skipped => style("SKIPPED").dim().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format a single step result line
pub fn format_step_result(result: &StepResult) -> String {
    let icon = match result.status {
        StepStatus::Succeeded => CHECK,
        StepStatus::Failed => {
            if result.ignored {
                WARN
            } else {
                CROSS
            }
        }
        StepStatus::Skipped => SKIP,
    };

    let mut line = format!(
        "{} {} - {}",
        icon,
        style(&result.step_name).bold(),
        format_step_status(result.status)
    );
    if result.ignored {
        line.push_str(&format!(" {}", style("(ignored)").yellow()));
    }
    if let Some(reason) = &result.reason {
        line.push_str(&format!(" ({})", style(reason).dim()));
    }
    line
}

/// Format a runner event for display
pub fn format_runner_event(event: &RunnerEvent) -> String {
    match event {
        RunnerEvent::RunStarted {
            run_id,
            pipeline_name,
        } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(&run_id.to_string()[..8]).dim()
        ),
        RunnerEvent::RunSkipped { pipeline_name, .. } => format!(
            "{} Pipeline {} skipped: trigger rejected event",
            SKIP,
            style(pipeline_name).bold()
        ),
        RunnerEvent::StepStarted { step_name } => {
            format!("{} Running step {}", INFO, style(step_name).bold())
        }
        RunnerEvent::StepSkipped { step_name, reason } => format!(
            "{} Skipping step {} ({})",
            SKIP,
            style(step_name).bold(),
            style(reason).dim()
        ),
        RunnerEvent::StepSucceeded { step_name, .. } => {
            format!("{} Step {} succeeded", CHECK, style(step_name).bold())
        }
        RunnerEvent::StepFailed {
            step_name,
            error,
            ignored,
        } => {
            if *ignored {
                format!(
                    "{} Step {} failed ({}), failure ignored",
                    WARN,
                    style(step_name).bold(),
                    style(error).red()
                )
            } else {
                format!(
                    "{} Step {} failed: {}",
                    CROSS,
                    style(step_name).bold(),
                    style(error).red()
                )
            }
        }
        RunnerEvent::RunCompleted { status, .. } => format!(
            "{} Pipeline run finished - {}",
            INFO,
            format_run_status(*status)
        ),
    }
}

/// Format the final report as a block of lines
pub fn format_report(report: &RunReport) -> String {
    let (succeeded, failed, skipped) = report.counts();
    let elapsed = report
        .duration()
        .and_then(|d| d.to_std().ok())
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string());
    let mut lines = vec![format!(
        "{} {} - {} in {} ({} succeeded, {} failed, {} skipped)",
        style(&report.run_id.to_string()[..8]).dim(),
        style(&report.pipeline_name).bold(),
        format_run_status(report.status),
        style(elapsed).dim(),
        style(succeeded).green(),
        style(failed).red(),
        style(skipped).dim()
    )];
    for result in &report.results {
        lines.push(format!("  {}", format_step_result(result)));
    }
    lines.join("\n")
}

/// Format a run summary line for history listings
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Skipped => SKIP,
    };

    format!(
        "{} {} - {} - {} ({}/{})",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        format_run_status(summary.status),
        summary.succeeded_steps,
        summary.total_steps
    )
}

/// Format a duration in human terms
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
