use anyhow::{Context, Result};
use stageline::cli::commands::{HistoryCommand, ListCommand, PlanCommand, RunCommand, ValidateCommand};
use stageline::cli::output::*;
use stageline::cli::{Cli, Command};
use stageline::core::{ConfigError, ExecutionStatus, Pipeline, PipelineConfig, RunReport};
use stageline::execution::{ExecutionEvent, ExecutionPlan, PipelineEvaluator};
use stageline::persistence::{create_summary, ExecutionSummary, PersistenceBackend};
use stageline::runner::{RunnerConfig, ShellRunner};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit code for configuration errors; command failures exit with 1
const CONFIG_EXIT_CODE: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::from_args();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{} {:#}", CROSS, e);
    }

    let code = match dispatch(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", CROSS, style(format!("{:#}", e)).red());
            if e.downcast_ref::<ConfigError>().is_some() {
                CONFIG_EXIT_CODE
            } else {
                1
            }
        }
    };

    std::process::exit(code);
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")
}

async fn dispatch(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, cli.stream).await,
        Command::Plan(cmd) => plan_pipeline(cmd).map(|_| 0),
        Command::Validate(cmd) => validate_pipeline(cmd).map(|_| 0),
        Command::List(cmd) => list_pipelines(cmd).await.map(|_| 0),
        Command::History(cmd) => show_history(cmd).await.map(|_| 0),
    }
}

/// Load a pipeline, applying `--env` overrides on top of the file's env
fn load_pipeline(file: &Path, overrides: &[(String, String)]) -> Result<Pipeline> {
    let mut config = PipelineConfig::from_file(file)
        .with_context(|| format!("Failed to load pipeline config {}", file.display()))?;

    for (key, value) in overrides {
        debug!("Environment override: {}={}", key, value);
        config.env.insert(key.clone(), value.clone());
    }

    let pipeline = config
        .to_pipeline()
        .with_context(|| format!("Invalid pipeline config {}", file.display()))?;
    Ok(pipeline)
}

#[cfg(feature = "sqlite")]
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    let store = stageline::persistence::SqliteExecutionStore::with_default_path()
        .await
        .context("Failed to open execution history")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    warn!("Built without sqlite support; history is kept in memory only");
    Ok(Arc::new(stageline::persistence::InMemoryPersistence::new()))
}

async fn run_pipeline(cmd: &RunCommand, stream: bool) -> Result<i32> {
    let pipeline = load_pipeline(&cmd.file, &cmd.env)?;
    let context = cmd.trigger.to_context();

    println!(
        "{} Loaded pipeline: {} ({} stages, {} jobs)",
        INFO,
        style(&pipeline.name).bold(),
        pipeline.stages.len(),
        pipeline.job_count()
    );

    let mut runner_config = RunnerConfig::new()
        .with_shell(cmd.shell.as_str())
        .with_clear_env(cmd.clean_env);
    if let Some(dir) = &cmd.working_dir {
        runner_config = runner_config.with_working_dir(dir.clone());
    }

    let mut evaluator = PipelineEvaluator::new(ShellRunner::new(runner_config));

    let progress = create_progress_bar(pipeline.stages.len());
    let bar = progress.clone();
    evaluator.add_event_handler(move |event| {
        if let Some(line) = format_execution_event(&event) {
            bar.println(line);
        }

        match &event {
            // Output of failing commands is always shown; the rest only when streaming
            ExecutionEvent::CommandFinished {
                exit_code, output, ..
            } if !output.trim().is_empty() && (stream || *exit_code != Some(0)) => {
                let max_lines = if stream { usize::MAX } else { 20 };
                bar.println(format_output(output.trim_end(), max_lines));
            }
            ExecutionEvent::StageFinished { .. }
            | ExecutionEvent::StageSkipped { .. }
            | ExecutionEvent::StageNotReached { .. } => bar.inc(1),
            _ => {}
        }
    });

    println!();
    let report = evaluator.evaluate(&pipeline, &context).await;
    progress.finish_and_clear();

    print_report(&report);

    if !cmd.no_history {
        save_history(&report).await;
    }

    match report.to_result() {
        Ok(()) => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&pipeline.name).bold(),
                style("successfully").green()
            );
            Ok(0)
        }
        Err(e) => {
            println!(
                "\n{} {} {}: {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red(),
                e
            );
            Ok(e.exit_code())
        }
    }
}

fn print_report(report: &RunReport) {
    println!("{}", style(separator()).dim());
    for stage in &report.stages {
        println!("{} {}", style(&stage.name).bold(), format_stage_outcome(stage.outcome));
        for result in report.results_for_stage(&stage.name) {
            println!(
                "  {:<30} {}",
                result.job,
                format_job_status(result.status)
            );
        }
        for deploy in report.deploys.iter().filter(|d| d.stage == stage.name) {
            println!(
                "  {} {} ({}): {:?}",
                ROCKET,
                deploy.provider,
                deploy.job,
                deploy.status
            );
        }
    }
    println!(
        "{} passed, {} failed, {} skipped",
        style(report.passed_count()).green(),
        style(report.failed_count()).red(),
        style(report.skipped_count()).dim()
    );
}

/// Record the run; a history failure never changes the run's exit code
async fn save_history(report: &RunReport) {
    let summary = create_summary(report);
    let saved = async {
        let store = open_store().await?;
        store.save_execution(&summary).await
    }
    .await;

    match saved {
        Ok(()) => println!(
            "\n{} Execution saved to history (ID: {})",
            INFO,
            style(&summary.execution_id.to_string()[..8]).dim()
        ),
        Err(e) => warn!("Failed to save execution history: {:#}", e),
    }
}

fn plan_pipeline(cmd: &PlanCommand) -> Result<()> {
    let pipeline = load_pipeline(&cmd.file, &cmd.env)?;
    let plan = ExecutionPlan::build(&pipeline, &cmd.trigger.to_context());

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("{}", format_plan(&plan));
    }

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let config = PipelineConfig::from_file(&cmd.file)
        .with_context(|| format!("Validation of {} failed", cmd.file.display()))?;

    println!("{} Pipeline configuration is valid!", CHECK);
    println!("  Name: {}", style(&config.name).bold());
    println!("  Stages: {}", style(config.stages.len()).cyan());
    println!("  Jobs: {}", style(config.job_count()).cyan());
    println!("  Environment: {}", style(config.env.len()).cyan());

    if cmd.json {
        let json = serde_json::to_string_pretty(&config)?;
        println!("\n{}", json);
    }

    Ok(())
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = open_store().await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    let mut json_data = Vec::new();
    if !cmd.json {
        println!("{} Pipelines in history:", INFO);
    }

    for pipeline_name in &pipelines {
        let executions = store.list_executions(pipeline_name).await?;
        let completed = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .count();
        let failed = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Failed)
            .count();

        if cmd.json {
            json_data.push(serde_json::json!({
                "name": pipeline_name,
                "execution_count": executions.len(),
                "completed": completed,
                "failed": failed,
            }));
        } else if cmd.with_counts {
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(executions.len()).cyan(),
                style(completed).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    if cmd.json {
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_store().await?;

    if let Some(execution_id) = cmd.execution_id {
        match store.load_execution(execution_id).await? {
            Some(summary) if cmd.json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => print_execution_details(&summary),
            None => println!("{} Execution not found", WARN),
        }
        return Ok(());
    }

    let mut executions = match &cmd.pipeline {
        Some(pipeline_name) => store.list_executions(pipeline_name).await?,
        None => {
            let mut all = Vec::new();
            for pipeline in store.list_pipelines().await? {
                all.extend(store.list_executions(&pipeline).await?);
            }
            all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all
        }
    };
    executions.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if executions.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(());
    }

    println!("{} Execution history (showing latest {}):", INFO, cmd.limit);
    for summary in &executions {
        println!("  {}", format_execution_summary(summary));
    }

    Ok(())
}

fn print_execution_details(summary: &ExecutionSummary) {
    println!("{} Execution Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Event: {}", style(summary.event).cyan());
    if let Some(git_ref) = &summary.git_ref {
        println!("  Ref: {}", style(git_ref).cyan());
    }
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Jobs: {} passed, {} failed, {} skipped of {}",
        style(summary.passed_jobs).green(),
        style(summary.failed_jobs).red(),
        style(summary.skipped_jobs).dim(),
        summary.total_jobs
    );
    if let Some(failure) = &summary.failure {
        println!("  Failure: {}", style(failure).red());
    }
}
