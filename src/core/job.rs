//! Job domain model

use crate::core::{
    condition::Predicate,
    config::{compile_condition, DeployConfig, JobConfig},
    context::TriggerContext,
    error::ConfigError,
};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A single job: a run predicate plus an ordered command sequence
#[derive(Debug, Clone)]
pub struct Job {
    /// Job name, unique within its stage
    pub name: String,

    /// Run predicate (None = always run)
    pub condition: Option<Predicate>,

    /// Command templates, executed in order
    pub commands: Vec<String>,

    /// Environment overrides
    pub env: HashMap<String, String>,

    /// Whether a failure of this job is tolerated
    pub allow_failure: bool,

    /// Wall-clock limit for the whole command sequence, in seconds
    pub timeout_secs: u64,

    /// Action to run once the stage has succeeded
    pub deploy: Option<DeployAction>,
}

/// Deploy action attached to a job
#[derive(Debug, Clone)]
pub struct DeployAction {
    pub provider: String,
    pub condition: Option<Predicate>,
    pub commands: Vec<String>,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct JobDefaults {
    pub timeout_secs: u64,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: crate::core::config::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Job {
    /// Create a job from its config, compiling its conditions
    pub fn from_config(
        config: &JobConfig,
        stage: &str,
        defaults: &JobDefaults,
    ) -> Result<Self, ConfigError> {
        let owner = format!("job '{}' in stage '{}'", config.name, stage);
        let condition = compile_condition(config.condition.as_deref(), || owner.clone())?;

        let deploy = config
            .deploy
            .as_ref()
            .map(|d| DeployAction::from_config(d, &owner))
            .transpose()?;

        Ok(Job {
            name: config.name.clone(),
            condition,
            commands: config.commands.clone(),
            env: config.env.clone(),
            allow_failure: config.allow_failure,
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
            deploy,
        })
    }

    /// Check the run predicate against the trigger context
    pub fn should_run(&self, ctx: &TriggerContext) -> bool {
        self.condition.as_ref().map_or(true, |c| c.evaluate(ctx))
    }
}

impl DeployAction {
    fn from_config(config: &DeployConfig, job_owner: &str) -> Result<Self, ConfigError> {
        let condition = compile_condition(config.condition.as_deref(), || {
            format!("deploy '{}' of {}", config.provider, job_owner)
        })?;

        Ok(DeployAction {
            provider: config.provider.clone(),
            condition,
            commands: config.commands.clone(),
            env: config.env.clone(),
        })
    }

    /// Check the deploy's own branch/tag condition
    pub fn should_run(&self, ctx: &TriggerContext) -> bool {
        self.condition.as_ref().map_or(true, |c| c.evaluate(ctx))
    }
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").unwrap());

/// Render a command with variable substitution
///
/// Replaces `{{ name }}` (and `{{name}}`) placeholders in a single pass, so
/// substituted values are never expanded again. Unknown placeholders are
/// left untouched for the shell to see.
pub fn render_command(template: &str, variables: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::EventType;

    fn job_config(yaml: &str) -> JobConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_render_command() {
        let mut vars = HashMap::new();
        vars.insert("tag".to_string(), "v2019.10.1".to_string());
        vars.insert("TEST_CATEGORY".to_string(), "large".to_string());

        assert_eq!(
            render_command("docker build -t garage:{{ tag }} .", &vars),
            "docker build -t garage:v2019.10.1 ."
        );
        assert_eq!(
            render_command("make ci-job-{{TEST_CATEGORY}} {{ unknown }}", &vars),
            "make ci-job-large {{ unknown }}"
        );
    }

    #[test]
    fn test_render_command_does_not_expand_substituted_values() {
        let mut vars = HashMap::new();
        vars.insert("A".to_string(), "{{ B }}".to_string());
        vars.insert("B".to_string(), "{{ A }}".to_string());

        assert_eq!(render_command("echo {{ A }} {{B}}", &vars), "echo {{ B }} {{ A }}");
    }

    #[test]
    fn test_timeout_defaults() {
        let defaults = JobDefaults { timeout_secs: 900 };

        let job = Job::from_config(&job_config("name: a\ncommands: [\"true\"]"), "test", &defaults)
            .unwrap();
        assert_eq!(job.timeout_secs, 900);

        let job = Job::from_config(
            &job_config("name: b\ncommands: [\"true\"]\ntimeout_secs: 30"),
            "test",
            &defaults,
        )
        .unwrap();
        assert_eq!(job.timeout_secs, 30);
    }

    #[test]
    fn test_should_run() {
        let config = job_config(
            r#"
name: "Large tests"
if: "NOT fork"
commands: ["make ci-job-large"]
"#,
        );
        let job = Job::from_config(&config, "test", &JobDefaults::default()).unwrap();

        let ctx = TriggerContext::new(EventType::Push).with_branch("master");
        assert!(job.should_run(&ctx));
        assert!(!job.should_run(&ctx.with_fork(true)));
    }

    #[test]
    fn test_deploy_condition() {
        let config = job_config(
            r#"
name: "Build"
commands: ["make dist"]
deploy:
  provider: pypi
  if: "event = tag"
  commands: ["twine upload dist/*"]
"#,
        );
        let job = Job::from_config(&config, "build", &JobDefaults::default()).unwrap();
        let deploy = job.deploy.as_ref().unwrap();

        assert_eq!(deploy.provider, "pypi");
        assert!(deploy.should_run(&TriggerContext::new(EventType::Tag).with_tag("v1")));
        assert!(!deploy.should_run(&TriggerContext::new(EventType::Push)));
    }
}
