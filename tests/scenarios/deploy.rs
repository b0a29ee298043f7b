//! Test: Deploy - actions that fire after a successful stage

use crate::helpers::*;
use stageline::core::{
    DeployStatus, EventType, JobStatus, PipelineError, StageOutcome, TriggerContext,
};
use stageline::execution::ExecutionEvent;

const RELEASE: &str = r#"
name: release
stages:
  - name: build
    jobs:
      - name: wheel
        commands: ["python -m build"]
        deploy:
          provider: pypi
          if: "event = tag"
          commands: ["twine upload dist/*"]
      - name: docs
        commands: ["make docs"]
        deploy:
          provider: pages
          if: "branch = main"
          commands: ["make publish-docs"]
  - name: announce
    jobs:
      - name: notify
        commands: ["make notify"]
"#;

/// Deploys run after every job of the stage, in job order
#[tokio::test]
async fn test_deploy_fires_after_stage_succeeds() {
    let ctx = TriggerContext::new(EventType::Tag).with_tag("v1.0.0");
    let result = run_yaml(RELEASE, MockRunner::new(), &ctx).await;

    assert_run_succeeded(&result);
    assert_commands(
        &result,
        &["python -m build", "make docs", "twine upload dist/*", "make notify"],
    );
    assert_deploy_status(&result, "build", "wheel", DeployStatus::Succeeded);
    assert_deploy_status(&result, "build", "docs", DeployStatus::Skipped);
}

/// A false deploy predicate records the deploy as skipped
#[tokio::test]
async fn test_deploy_predicate_false() {
    let ctx = TriggerContext::new(EventType::Push).with_branch("main");
    let result = run_yaml(RELEASE, MockRunner::new(), &ctx).await;

    assert_run_succeeded(&result);
    assert_deploy_status(&result, "build", "wheel", DeployStatus::Skipped);
    assert_deploy_status(&result, "build", "docs", DeployStatus::Succeeded);
    assert!(!result.command_lines().contains(&"twine upload dist/*".to_string()));
}

/// No deploy fires when a required job of its stage failed
#[tokio::test]
async fn test_no_deploy_after_failure() {
    let ctx = TriggerContext::new(EventType::Tag).with_tag("v1.0.0");
    let runner = MockRunner::new().fail("make docs", 1);
    let result = run_yaml(RELEASE, runner, &ctx).await;

    assert_run_failed(&result);
    assert!(result.report.deploys.is_empty());
    assert_commands(&result, &["python -m build", "make docs"]);
}

/// A deploy failure fails the run and halts later stages but leaves job results alone
#[tokio::test]
async fn test_deploy_failure_fails_run() {
    let ctx = TriggerContext::new(EventType::Tag)
        .with_tag("v1.0.0")
        .with_branch("main");
    let runner = MockRunner::new().fail("twine upload dist/*", 1);
    let result = run_yaml(RELEASE, runner, &ctx).await;

    assert_run_failed(&result);
    assert_job_status(&result, "build", "wheel", JobStatus::Passed);
    assert_deploy_status(&result, "build", "wheel", DeployStatus::Failed);
    // later deploys of the same stage do not fire
    assert_deploy_status(&result, "build", "docs", DeployStatus::Skipped);
    assert_stage_outcome(&result, "build", StageOutcome::Failed);
    assert_stage_outcome(&result, "announce", StageOutcome::NotReached);
    assert_no_results_for_stage(&result, "announce");

    match result.report.to_result() {
        Err(PipelineError::DeployFailure { provider, exit_code, .. }) => {
            assert_eq!(provider, "pypi");
            assert_eq!(exit_code, Some(1));
        }
        other => panic!("expected deploy failure, got {:?}", other),
    }
}

/// A job that was allowed to fail never deploys
#[tokio::test]
async fn test_allowed_failure_does_not_deploy() {
    let yaml = r#"
name: release
stages:
  - name: build
    jobs:
      - name: experimental
        allow_failure: true
        commands: ["make experimental"]
        deploy:
          provider: s3
          commands: ["make upload"]
"#;
    let runner = MockRunner::new().fail("make experimental", 1);
    let result = run_yaml(yaml, runner, &TriggerContext::default()).await;

    assert_run_succeeded(&result);
    assert_deploy_status(&result, "build", "experimental", DeployStatus::Skipped);
}

#[tokio::test]
async fn test_deploy_events_are_emitted() {
    let ctx = TriggerContext::new(EventType::Tag).with_tag("v1.0.0");
    let result = run_yaml(RELEASE, MockRunner::new(), &ctx).await;

    let started: Vec<&str> = result
        .events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::DeployStarted { provider, .. } => Some(provider.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec!["pypi"]);
}
