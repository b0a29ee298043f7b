//! Test utility functions for stageline

#![allow(dead_code)]

use async_trait::async_trait;
use stageline::core::{
    DeployStatus, ExecutionStatus, JobStatus, PipelineConfig, RunReport, StageOutcome,
    TriggerContext,
};
use stageline::execution::{ExecutionEvent, PipelineEvaluator};
use stageline::runner::{CommandOutput, CommandRunner, RunnerError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A command the mock runner was asked to run
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    pub command: String,
    pub env: HashMap<String, String>,
}

/// Mock runner with scripted exit codes
///
/// Commands exit 0 unless scripted otherwise; every call is recorded.
#[derive(Default)]
pub struct MockRunner {
    exit_codes: HashMap<String, i32>,
    unspawnable: HashSet<String>,
    log: Mutex<Vec<RecordedCommand>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command` exit with `code`
    pub fn fail(mut self, command: &str, code: i32) -> Self {
        self.exit_codes.insert(command.to_string(), code);
        self
    }

    /// Make `command` fail to spawn
    pub fn unspawnable(mut self, command: &str) -> Self {
        self.unspawnable.insert(command.to_string());
        self
    }

    pub fn recorded(&self) -> Vec<RecordedCommand> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, RunnerError> {
        self.log.lock().unwrap().push(RecordedCommand {
            command: command.to_string(),
            env: env.clone(),
        });

        if self.unspawnable.contains(command) {
            return Err(RunnerError::Spawn {
                command: command.to_string(),
                reason: "No such file or directory".to_string(),
            });
        }

        let code = self.exit_codes.get(command).copied().unwrap_or(0);
        let mut output = CommandOutput::with_exit_code(code);
        output.stdout = format!("ran {}\n", command);
        Ok(output)
    }
}

/// Everything observable about one evaluation
pub struct PipelineTestResult {
    pub report: RunReport,
    pub commands: Vec<RecordedCommand>,
    pub events: Vec<ExecutionEvent>,
}

impl PipelineTestResult {
    /// Commands in the order they were run
    pub fn command_lines(&self) -> Vec<String> {
        self.commands.iter().map(|c| c.command.clone()).collect()
    }

    /// Environment a command ran with
    pub fn env_of(&self, command: &str) -> &HashMap<String, String> {
        &self
            .commands
            .iter()
            .find(|c| c.command == command)
            .unwrap_or_else(|| panic!("command `{}` was never run", command))
            .env
    }

    pub fn summary(&self) -> String {
        self.report
            .job_results
            .iter()
            .map(|r| format!("{}/{}: {:?}", r.stage, r.job, r.status))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse `yaml` and evaluate it with `runner` for `context`
pub async fn run_yaml(yaml: &str, runner: MockRunner, context: &TriggerContext) -> PipelineTestResult {
    let pipeline = PipelineConfig::from_yaml(yaml)
        .and_then(|c| c.to_pipeline())
        .expect("pipeline should load");

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let mut evaluator = PipelineEvaluator::new(runner);
    evaluator.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let report = evaluator.evaluate(&pipeline, context).await;
    let commands = evaluator.runner().recorded();
    let events = events.lock().unwrap().clone();

    PipelineTestResult {
        report,
        commands,
        events,
    }
}

pub fn assert_run_succeeded(result: &PipelineTestResult) {
    assert_eq!(
        result.report.status,
        ExecutionStatus::Completed,
        "expected success, got:\n{}",
        result.summary()
    );
    assert!(result.report.to_result().is_ok());
}

pub fn assert_run_failed(result: &PipelineTestResult) {
    assert_eq!(
        result.report.status,
        ExecutionStatus::Failed,
        "expected failure, got:\n{}",
        result.summary()
    );
    assert!(result.report.to_result().is_err());
}

pub fn assert_job_status(result: &PipelineTestResult, stage: &str, job: &str, expected: JobStatus) {
    let actual = result
        .report
        .job_result(stage, job)
        .unwrap_or_else(|| panic!("no result for {}/{}:\n{}", stage, job, result.summary()))
        .status;
    assert_eq!(actual, expected, "status of {}/{}", stage, job);
}

pub fn assert_stage_outcome(result: &PipelineTestResult, stage: &str, expected: StageOutcome) {
    assert_eq!(result.report.stage_outcome(stage), Some(expected), "outcome of stage {}", stage);
}

/// A stage that was skipped or never reached has zero job results
pub fn assert_no_results_for_stage(result: &PipelineTestResult, stage: &str) {
    let count = result.report.results_for_stage(stage).count();
    assert_eq!(count, 0, "stage {} produced {} results", stage, count);
}

pub fn assert_commands(result: &PipelineTestResult, expected: &[&str]) {
    assert_eq!(result.command_lines(), expected);
}

pub fn assert_deploy_status(result: &PipelineTestResult, stage: &str, job: &str, expected: DeployStatus) {
    let actual = result
        .report
        .deploy_result(stage, job)
        .unwrap_or_else(|| panic!("no deploy result for {}/{}", stage, job))
        .status;
    assert_eq!(actual, expected, "deploy of {}/{}", stage, job);
}
