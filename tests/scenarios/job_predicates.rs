//! Test: Job Predicates - jobs gated on the trigger context

use crate::helpers::*;
use stageline::core::{EventType, JobStatus, SkipReason, TriggerContext};

const MATRIX: &str = r#"
name: matrix
stages:
  - name: test
    jobs:
      - name: unit
        commands: ["make test"]
      - name: integration
        if: "NOT fork"
        commands: ["make integration"]
      - name: nightly
        if: "event IN (cron) OR vars.NIGHTLY"
        commands: ["make nightly"]
      - name: release-check
        if: "branch =~ ^release/ OR tag"
        commands: ["make release-check"]
"#;

/// A false predicate yields skipped and runs zero commands
#[tokio::test]
async fn test_false_predicate_skips_without_running() {
    let ctx = TriggerContext::new(EventType::PullRequest)
        .with_branch("feature/x")
        .with_fork(true);
    let result = run_yaml(MATRIX, MockRunner::new(), &ctx).await;

    assert_run_succeeded(&result);
    assert_commands(&result, &["make test"]);
    for job in ["integration", "nightly", "release-check"] {
        assert_job_status(&result, "test", job, JobStatus::Skipped(SkipReason::Predicate));
    }
}

#[tokio::test]
async fn test_cron_runs_nightly() {
    let ctx = TriggerContext::new(EventType::Cron).with_branch("main");
    let result = run_yaml(MATRIX, MockRunner::new(), &ctx).await;

    assert_commands(&result, &["make test", "make integration", "make nightly"]);
}

#[tokio::test]
async fn test_explicit_toggle_enables_job() {
    let ctx = TriggerContext::new(EventType::Push)
        .with_branch("main")
        .with_var("NIGHTLY", "1");
    let result = run_yaml(MATRIX, MockRunner::new(), &ctx).await;

    assert_job_status(&result, "test", "nightly", JobStatus::Passed);
}

#[tokio::test]
async fn test_release_branch_and_tag_match() {
    let on_branch = TriggerContext::new(EventType::Push).with_branch("release/2.1");
    let result = run_yaml(MATRIX, MockRunner::new(), &on_branch).await;
    assert_job_status(&result, "test", "release-check", JobStatus::Passed);

    let on_tag = TriggerContext::new(EventType::Tag).with_tag("v2.1.0");
    let result = run_yaml(MATRIX, MockRunner::new(), &on_tag).await;
    assert_job_status(&result, "test", "release-check", JobStatus::Passed);
}

/// Skipped jobs are not failures and do not abort the stage
#[tokio::test]
async fn test_skipped_job_does_not_abort_stage() {
    let yaml = r#"
name: skips
stages:
  - name: test
    jobs:
      - name: first
        if: "event = tag"
        commands: ["make first"]
      - name: second
        commands: ["make second"]
"#;
    let result = run_yaml(yaml, MockRunner::new(), &TriggerContext::new(EventType::Push)).await;

    assert_run_succeeded(&result);
    assert_job_status(&result, "test", "first", JobStatus::Skipped(SkipReason::Predicate));
    assert_job_status(&result, "test", "second", JobStatus::Passed);
    assert_eq!(result.report.skipped_count(), 1);
}
