//! Test: Configuration Errors - rejected at load time, before anything runs

use stageline::core::{ConfigError, PipelineConfig, PipelineError, PredicateError};

fn load(yaml: &str) -> Result<(), ConfigError> {
    PipelineConfig::from_yaml(yaml)?.to_pipeline().map(|_| ())
}

#[test]
fn test_malformed_predicate_names_its_job() {
    let yaml = r#"
name: broken
stages:
  - name: test
    jobs:
      - name: unit
        if: "event = tag AND"
        commands: ["make test"]
"#;
    let err = load(yaml).unwrap_err();

    match &err {
        ConfigError::Predicate { owner, .. } => {
            assert_eq!(owner, "job 'unit' in stage 'test'");
        }
        other => panic!("expected predicate error, got {:?}", other),
    }
    assert_eq!(PipelineError::from(err).exit_code(), 2);
}

#[test]
fn test_unknown_field_in_stage_predicate() {
    let yaml = r#"
name: broken
stages:
  - name: deploy
    if: "author = me"
    jobs:
      - name: publish
        commands: ["make publish"]
"#;
    match load(yaml) {
        Err(ConfigError::Predicate {
            owner,
            source: PredicateError::UnknownField(field),
        }) => {
            assert_eq!(owner, "stage 'deploy'");
            assert_eq!(field, "author");
        }
        other => panic!("expected unknown field, got {:?}", other),
    }
}

#[test]
fn test_invalid_deploy_regex() {
    let yaml = r#"
name: broken
stages:
  - name: build
    jobs:
      - name: wheel
        commands: ["python -m build"]
        deploy:
          provider: pypi
          if: "tag =~ /v(/"
          commands: ["twine upload dist/*"]
"#;
    assert!(matches!(
        load(yaml),
        Err(ConfigError::Predicate {
            source: PredicateError::InvalidRegex { .. },
            ..
        })
    ));
}

#[test]
fn test_structural_errors() {
    let empty_commands = r#"
name: broken
stages:
  - name: test
    jobs:
      - name: unit
        commands: []
"#;
    assert!(matches!(load(empty_commands), Err(ConfigError::NoCommands { .. })));

    let duplicate_jobs = r#"
name: broken
stages:
  - name: test
    jobs:
      - name: unit
        commands: ["a"]
      - name: unit
        commands: ["b"]
"#;
    assert!(matches!(load(duplicate_jobs), Err(ConfigError::DuplicateJob { .. })));

    let unknown_key = r#"
name: broken
stages:
  - name: test
    jobs:
      - name: unit
        script: ["a"]
        retries: 3
"#;
    assert!(matches!(load(unknown_key), Err(ConfigError::Yaml(_))));
}
