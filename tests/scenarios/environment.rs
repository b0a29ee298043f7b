//! Test: Environment - layering, CI variables and placeholder rendering

use crate::helpers::*;
use stageline::core::{EventType, TriggerContext};

const LAYERED: &str = r#"
name: layered
env:
  TEST_CATEGORY: small
  REGISTRY: registry.local
stages:
  - name: test
    jobs:
      - name: Large tests
        env:
          TEST_CATEGORY: large
        commands: ["make ci-job-{{ TEST_CATEGORY }}"]
        deploy:
          provider: registry
          env:
            REGISTRY: registry.example.com
          commands: ["docker push {{ REGISTRY }}/garage:{{ build_number }}"]
      - name: Small tests
        commands: ["make ci-job-{{TEST_CATEGORY}}"]
"#;

#[tokio::test]
async fn test_job_env_overrides_pipeline_env() {
    let ctx = TriggerContext::new(EventType::Push).with_branch("main");
    let result = run_yaml(LAYERED, MockRunner::new(), &ctx).await;

    assert_run_succeeded(&result);
    assert_eq!(
        result.env_of("make ci-job-large").get("TEST_CATEGORY").map(String::as_str),
        Some("large")
    );
    assert_eq!(
        result.env_of("make ci-job-small").get("TEST_CATEGORY").map(String::as_str),
        Some("small")
    );
}

#[tokio::test]
async fn test_deploy_env_and_context_placeholders() {
    let ctx = TriggerContext::new(EventType::Tag)
        .with_tag("v3.0.0")
        .with_build_number(128);
    let result = run_yaml(LAYERED, MockRunner::new(), &ctx).await;

    let push = "docker push registry.example.com/garage:128";
    assert!(result.command_lines().contains(&push.to_string()), "{:?}", result.command_lines());
    assert_eq!(result.env_of(push).get("TEST_CATEGORY").map(String::as_str), Some("large"));
}

#[tokio::test]
async fn test_trigger_context_is_exported() {
    let ctx = TriggerContext::new(EventType::PullRequest)
        .with_branch("feature/x")
        .with_fork(true)
        .with_build_number(9);
    let result = run_yaml(LAYERED, MockRunner::new(), &ctx).await;

    let env = result.env_of("make ci-job-large");
    assert_eq!(env.get("CI").map(String::as_str), Some("true"));
    assert_eq!(env.get("CI_EVENT_TYPE").map(String::as_str), Some("pull_request"));
    assert_eq!(env.get("CI_BRANCH").map(String::as_str), Some("feature/x"));
    assert_eq!(env.get("CI_PULL_REQUEST_FORK").map(String::as_str), Some("true"));
    assert_eq!(env.get("CI_BUILD_NUMBER").map(String::as_str), Some("9"));
    assert!(env.get("CI_TAG").is_none());
}
