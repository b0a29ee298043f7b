//! Test: Short Circuit - first failing command stops its job, stage and pipeline

use crate::helpers::*;
use stageline::core::{JobStatus, PipelineError, SkipReason, StageOutcome, TriggerContext};

const GARAGE: &str = r#"
name: garage
stages:
  - name: test
    jobs:
      - name: Large tests
        commands: ["cmd1", "cmd2"]
      - name: Small tests
        commands: ["make ci-job-small"]
  - name: package
    jobs:
      - name: dist
        commands: ["make dist"]
"#;

/// cmd1 exits 1: the job fails, cmd2 never runs, later stages produce nothing
#[tokio::test]
async fn test_first_failing_command_aborts_everything_after_it() {
    let runner = MockRunner::new().fail("cmd1", 1);
    let result = run_yaml(GARAGE, runner, &TriggerContext::default()).await;

    assert_run_failed(&result);
    assert_commands(&result, &["cmd1"]);

    let large = result.report.job_result("test", "Large tests").unwrap();
    assert_eq!(large.status, JobStatus::Failed);
    assert_eq!(large.exit_code, Some(1));
    assert_eq!(large.failed_command.as_deref(), Some("cmd1"));

    assert_job_status(&result, "test", "Small tests", JobStatus::Skipped(SkipReason::StageAborted));
    assert_stage_outcome(&result, "package", StageOutcome::NotReached);
    assert_no_results_for_stage(&result, "package");
}

/// The run maps onto a command failure naming the job and command
#[tokio::test]
async fn test_failure_maps_to_command_failure() {
    let runner = MockRunner::new().fail("cmd2", 4);
    let result = run_yaml(GARAGE, runner, &TriggerContext::default()).await;

    assert_commands(&result, &["cmd1", "cmd2"]);
    match result.report.to_result() {
        Err(e @ PipelineError::CommandFailure { .. }) => {
            assert_eq!(e.exit_code(), 1);
            let message = e.to_string();
            assert!(message.contains("Large tests"), "{}", message);
            assert!(message.contains("cmd2"), "{}", message);
        }
        other => panic!("expected command failure, got {:?}", other),
    }
}

/// A command that cannot be spawned fails the job with no exit code
#[tokio::test]
async fn test_spawn_error_is_failure_without_exit_code() {
    let runner = MockRunner::new().unspawnable("cmd1");
    let result = run_yaml(GARAGE, runner, &TriggerContext::default()).await;

    assert_run_failed(&result);
    let large = result.report.job_result("test", "Large tests").unwrap();
    assert_eq!(large.status, JobStatus::Failed);
    assert_eq!(large.exit_code, None);
}

/// An allowed failure is recorded but the stage and pipeline carry on
#[tokio::test]
async fn test_allow_failure_does_not_abort() {
    let yaml = r#"
name: garage
stages:
  - name: test
    jobs:
      - name: flaky
        allow_failure: true
        commands: ["make flaky", "never"]
      - name: unit
        commands: ["make test"]
  - name: package
    jobs:
      - name: dist
        commands: ["make dist"]
"#;
    let runner = MockRunner::new().fail("make flaky", 2);
    let result = run_yaml(yaml, runner, &TriggerContext::default()).await;

    assert_run_succeeded(&result);
    assert_commands(&result, &["make flaky", "make test", "make dist"]);
    assert_job_status(&result, "test", "flaky", JobStatus::Failed);
    assert_job_status(&result, "test", "unit", JobStatus::Passed);
    assert_stage_outcome(&result, "test", StageOutcome::Passed);
    assert_eq!(result.report.failed_count(), 1);
}
