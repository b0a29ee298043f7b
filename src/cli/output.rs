//! CLI output formatting

use crate::{
    core::{DeployStatus, ExecutionStatus, JobStatus, SkipReason, StageOutcome},
    execution::{ExecutionEvent, ExecutionPlan},
    persistence::ExecutionSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Write as _;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar counting finished stages
pub fn create_progress_bar(total_stages: usize) -> ProgressBar {
    let progress = ProgressBar::new(total_stages as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} stages {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// A horizontal rule spanning the terminal width
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    "─".repeat(width)
}

/// Format a job status for display
pub fn format_job_status(status: JobStatus) -> String {
    match status {
        JobStatus::Passed => style("PASSED").green().to_string(),
        JobStatus::Failed => style("FAILED").red().to_string(),
        JobStatus::Skipped(SkipReason::Predicate) => style("SKIPPED").dim().to_string(),
        JobStatus::Skipped(SkipReason::StageAborted) => {
            style("SKIPPED (stage aborted)").yellow().to_string()
        }
    }
}

/// Format a stage outcome for display
pub fn format_stage_outcome(outcome: StageOutcome) -> String {
    match outcome {
        StageOutcome::Passed => style("PASSED").green().to_string(),
        StageOutcome::Failed => style("FAILED").red().to_string(),
        StageOutcome::Skipped => style("SKIPPED").dim().to_string(),
        StageOutcome::NotReached => style("NOT REACHED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format execution summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
    };

    format!(
        "{} {} - {} - {} - {}{} - {} passed, {} failed, {} skipped",
        status_icon,
        style(&summary.execution_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        style(summary.event).cyan(),
        summary
            .git_ref
            .as_ref()
            .map(|r| format!(" {}", r))
            .unwrap_or_default(),
        style(summary.passed_jobs).green(),
        style(summary.failed_jobs).red(),
        style(summary.skipped_jobs).dim(),
    )
}

/// Format an execution event for display
///
/// Returns `None` for events that only matter when streaming output.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            context,
        } => format!(
            "{} Starting pipeline {} ({}) for {}{}",
            ROCKET,
            style(pipeline_name).bold(),
            style(&execution_id.to_string()[..8]).dim(),
            style(context.event()).cyan(),
            context
                .git_ref()
                .map(|r| format!(" on {}", style(r).cyan()))
                .unwrap_or_default()
        ),
        ExecutionEvent::StageStarted { stage, job_count } => format!(
            "\n{} Stage {} ({} jobs)",
            INFO,
            style(stage).bold(),
            job_count
        ),
        ExecutionEvent::StageSkipped { stage } => format!(
            "{} Stage {} {}",
            SKIP,
            style(stage).dim(),
            style("skipped: condition not met").dim()
        ),
        ExecutionEvent::StageNotReached { stage } => format!(
            "{} Stage {} {}",
            SKIP,
            style(stage).dim(),
            style("not reached").dim()
        ),
        ExecutionEvent::JobStarted { job, .. } => format!("{} {}", SPINNER, style(job).cyan()),
        ExecutionEvent::JobSkipped { job, reason, .. } => format!(
            "{} {} {}",
            SKIP,
            style(job).dim(),
            format_job_status(JobStatus::Skipped(*reason))
        ),
        ExecutionEvent::CommandStarted { command, .. } => {
            format!("    {}", style(format!("$ {}", command)).dim())
        }
        ExecutionEvent::CommandFinished { .. } => return None,
        ExecutionEvent::JobFinished { result } => {
            let icon = match result.status {
                JobStatus::Passed => CHECK,
                JobStatus::Failed if result.allow_failure => WARN,
                JobStatus::Failed => CROSS,
                JobStatus::Skipped(_) => SKIP,
            };
            let mut line = format!(
                "{} {} {} {}",
                icon,
                style(&result.job).bold(),
                format_job_status(result.status),
                style(format_duration(result.duration)).dim()
            );
            if let Some(command) = &result.failed_command {
                let exit = result
                    .exit_code
                    .map(|c| format!("exit {}", c))
                    .unwrap_or_else(|| "no exit code".to_string());
                let _ = write!(line, "\n    {} `{}` ({})", style("failed at").red(), command, exit);
            }
            if result.status == JobStatus::Failed && result.allow_failure {
                let _ = write!(line, " {}", style("allowed to fail").yellow());
            }
            line
        }
        ExecutionEvent::DeployStarted { provider, job, .. } => format!(
            "{} Deploying {} via {}",
            ROCKET,
            style(job).bold(),
            style(provider).cyan()
        ),
        ExecutionEvent::DeployFinished { result } => match result.status {
            DeployStatus::Succeeded => format!(
                "{} Deploy {} {}",
                CHECK,
                style(&result.provider).bold(),
                style("succeeded").green()
            ),
            DeployStatus::Failed => format!(
                "{} Deploy {} {}{}",
                CROSS,
                style(&result.provider).bold(),
                style("failed").red(),
                result
                    .exit_code
                    .map(|c| format!(" (exit {})", c))
                    .unwrap_or_default()
            ),
            DeployStatus::Skipped => format!(
                "{} Deploy {} {}",
                SKIP,
                style(&result.provider).dim(),
                style("skipped").dim()
            ),
        },
        ExecutionEvent::StageFinished { stage, outcome } => format!(
            "{} Stage {} {}",
            INFO,
            style(stage).bold(),
            format_stage_outcome(*outcome)
        ),
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => {
                    format!("{} completed", style("successfully").green())
                }
                ExecutionStatus::Failed => style("failed").red().to_string(),
                other => format!("{:?}", other),
            };
            format!(
                "\n{} Pipeline ({}) {}",
                INFO,
                style(&execution_id.to_string()[..8]).dim(),
                status_str
            )
        }
    };

    Some(line)
}

/// Format a dry-run plan
pub fn format_plan(plan: &ExecutionPlan) -> String {
    let mut out = format!("{} Plan for {}\n", INFO, style(&plan.pipeline_name).bold());

    for stage in &plan.stages {
        if !stage.runs {
            let _ = writeln!(out, "{} {} {}", SKIP, style(&stage.name).dim(), style("(condition not met)").dim());
            continue;
        }

        let _ = writeln!(out, "{} {}", ROCKET, style(&stage.name).bold());
        for job in &stage.jobs {
            if !job.runs {
                let _ = writeln!(out, "  {} {}", SKIP, style(&job.name).dim());
                continue;
            }

            let marker = if job.allow_failure {
                format!(" {}", style("(allowed to fail)").yellow())
            } else {
                String::new()
            };
            let _ = writeln!(out, "  {} {}{}", CHECK, style(&job.name).cyan(), marker);
            for command in &job.commands {
                let _ = writeln!(out, "      {}", style(format!("$ {}", command)).dim());
            }
            if let Some(deploy) = &job.deploy {
                let state = if deploy.runs {
                    style("on success").green().to_string()
                } else {
                    style("skipped").dim().to_string()
                };
                let _ = writeln!(out, "      {} deploy via {} {}", ROCKET, deploy.provider, state);
            }
        }
    }

    let _ = write!(out, "{} {} jobs would run", INFO, plan.job_count());
    out
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}.{}s", secs, duration.subsec_millis() / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
