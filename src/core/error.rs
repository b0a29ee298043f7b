//! Error types for pipeline loading and evaluation

use crate::core::condition::PredicateError;
use thiserror::Error;

/// A pipeline definition that cannot be run
///
/// Always reported before any job executes.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read pipeline file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pipeline YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("pipeline name must not be empty")]
    EmptyPipelineName,

    #[error("pipeline has no stages")]
    NoStages,

    #[error("stage #{0} has an empty name")]
    EmptyStageName(usize),

    #[error("duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("stage '{0}' has no jobs")]
    EmptyStage(String),

    #[error("job #{index} in stage '{stage}' has an empty name")]
    EmptyJobName { stage: String, index: usize },

    #[error("duplicate job name '{job}' in stage '{stage}'")]
    DuplicateJob { stage: String, job: String },

    #[error("{owner} has no commands")]
    NoCommands { owner: String },

    #[error("{owner} has a zero timeout")]
    ZeroTimeout { owner: String },

    #[error("invalid condition on {owner}: {source}")]
    Predicate {
        owner: String,
        #[source]
        source: PredicateError,
    },
}

/// Failure taxonomy surfaced to the invoking environment
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("job '{job}' in stage '{stage}' failed: `{command}` {}", describe_exit(.exit_code))]
    CommandFailure {
        stage: String,
        job: String,
        command: String,
        exit_code: Option<i32>,
    },

    #[error("deploy '{provider}' for job '{job}' failed {}", describe_exit(.exit_code))]
    DeployFailure {
        job: String,
        provider: String,
        exit_code: Option<i32>,
    },
}

impl PipelineError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Configuration(_) => 2,
            PipelineError::CommandFailure { .. } | PipelineError::DeployFailure { .. } => 1,
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("with exit code {}", code),
        None => "without an exit code".to_string(),
    }
}
