//! Test: Stage Gating - stage predicates and progression between stages

use crate::helpers::*;
use stageline::core::{EventType, JobStatus, StageOutcome, TriggerContext};

const BUILD_TEST_DEPLOY: &str = r#"
name: "Build, Test, Deploy"
stages:
  - name: Build
    jobs:
      - name: image
        commands: ["make build-ci"]
  - name: Test
    jobs:
      - name: unit
        commands: ["make test"]
  - name: Deploy
    if: "event = tag"
    jobs:
      - name: publish
        commands: ["make publish"]
"#;

/// A pull request runs Build and Test; the tag-only Deploy stage produces nothing
#[tokio::test]
async fn test_pull_request_skips_tag_only_stage() {
    let ctx = TriggerContext::new(EventType::PullRequest).with_branch("feature/x");
    let result = run_yaml(BUILD_TEST_DEPLOY, MockRunner::new(), &ctx).await;

    assert_run_succeeded(&result);
    assert_commands(&result, &["make build-ci", "make test"]);
    assert_stage_outcome(&result, "Build", StageOutcome::Passed);
    assert_stage_outcome(&result, "Test", StageOutcome::Passed);
    assert_stage_outcome(&result, "Deploy", StageOutcome::Skipped);
    assert_no_results_for_stage(&result, "Deploy");
    assert_eq!(result.report.job_results.len(), 2);
}

/// A tag event runs all three stages in order
#[tokio::test]
async fn test_tag_runs_every_stage() {
    let ctx = TriggerContext::new(EventType::Tag).with_tag("v1.0.0");
    let result = run_yaml(BUILD_TEST_DEPLOY, MockRunner::new(), &ctx).await;

    assert_run_succeeded(&result);
    assert_commands(&result, &["make build-ci", "make test", "make publish"]);
    assert_job_status(&result, "Deploy", "publish", JobStatus::Passed);
}

/// A failed stage leaves every later stage unreached, even ones whose predicate holds
#[tokio::test]
async fn test_failed_stage_blocks_later_stages() {
    let ctx = TriggerContext::new(EventType::Tag).with_tag("v1.0.0");
    let runner = MockRunner::new().fail("make test", 1);
    let result = run_yaml(BUILD_TEST_DEPLOY, runner, &ctx).await;

    assert_run_failed(&result);
    assert_stage_outcome(&result, "Test", StageOutcome::Failed);
    assert_stage_outcome(&result, "Deploy", StageOutcome::NotReached);
    assert_no_results_for_stage(&result, "Deploy");
    assert!(!result.command_lines().contains(&"make publish".to_string()));
}

/// A skipped stage does not stop progression
#[tokio::test]
async fn test_skipped_stage_does_not_block() {
    let yaml = r#"
name: gating
stages:
  - name: lint
    if: "event = pull_request"
    jobs:
      - name: lint
        commands: ["make lint"]
  - name: test
    jobs:
      - name: unit
        commands: ["make test"]
"#;
    let result = run_yaml(yaml, MockRunner::new(), &TriggerContext::new(EventType::Push)).await;

    assert_run_succeeded(&result);
    assert_stage_outcome(&result, "lint", StageOutcome::Skipped);
    assert_commands(&result, &["make test"]);
}

/// Exactly one result per job of every reached stage
#[tokio::test]
async fn test_one_result_per_job_in_reached_stages() {
    let yaml = r#"
name: counting
stages:
  - name: first
    jobs:
      - name: a
        commands: ["a"]
      - name: b
        if: "event = cron"
        commands: ["b"]
      - name: c
        commands: ["c"]
  - name: second
    jobs:
      - name: d
        commands: ["d"]
"#;
    let result = run_yaml(yaml, MockRunner::new(), &TriggerContext::new(EventType::Push)).await;

    let names: Vec<(String, String)> = result
        .report
        .job_results
        .iter()
        .map(|r| (r.stage.clone(), r.job.clone()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("first".to_string(), "a".to_string()),
            ("first".to_string(), "b".to_string()),
            ("first".to_string(), "c".to_string()),
            ("second".to_string(), "d".to_string()),
        ]
    );
}
