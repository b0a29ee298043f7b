//! Pipeline configuration from YAML

use crate::core::{condition::Predicate, error::ConfigError, Pipeline};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Default per-job timeout when neither the job nor the pipeline sets one
pub const DEFAULT_TIMEOUT_SECS: u64 = 3000;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Environment shared by every job
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Stages in execution order
    pub stages: Vec<StageConfig>,

    /// Default timeout for each job (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
}

/// Stage configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    /// Unique stage name
    pub name: String,

    /// Condition for entering the stage
    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Jobs in execution order
    pub jobs: Vec<JobConfig>,
}

/// Job configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Job name, unique within its stage
    pub name: String,

    /// Condition for running the job
    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Shell commands, run in order
    #[serde(alias = "script")]
    pub commands: Vec<String>,

    /// Environment overrides for this job
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// A failure of this job is reported but does not stop the stage
    #[serde(default)]
    pub allow_failure: bool,

    /// Wall-clock limit for this job's commands (overrides the pipeline default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Action to run after the stage succeeds
    #[serde(default)]
    pub deploy: Option<DeployConfig>,
}

/// Deploy action configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Label for the deploy target (e.g. "pypi")
    pub provider: String,

    /// Branch/tag condition for deploying
    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Shell commands that perform the deploy
    #[serde(alias = "script")]
    pub commands: Vec<String>,

    /// Environment overrides for the deploy commands
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    ///
    /// Covers the structure as well as every condition, so a config that
    /// passes here always converts into a [`Pipeline`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyPipelineName);
        }
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }
        if self.default_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout {
                owner: format!("pipeline '{}'", self.name),
            });
        }

        let mut seen_stages = HashSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                return Err(ConfigError::EmptyStageName(index + 1));
            }
            if !seen_stages.insert(stage.name.as_str()) {
                return Err(ConfigError::DuplicateStage(stage.name.clone()));
            }
            if stage.jobs.is_empty() {
                return Err(ConfigError::EmptyStage(stage.name.clone()));
            }

            let mut seen_jobs = HashSet::new();
            for (job_index, job) in stage.jobs.iter().enumerate() {
                if job.name.trim().is_empty() {
                    return Err(ConfigError::EmptyJobName {
                        stage: stage.name.clone(),
                        index: job_index + 1,
                    });
                }
                if !seen_jobs.insert(job.name.as_str()) {
                    return Err(ConfigError::DuplicateJob {
                        stage: stage.name.clone(),
                        job: job.name.clone(),
                    });
                }

                let owner = format!("job '{}' in stage '{}'", job.name, stage.name);
                if job.commands.is_empty() {
                    return Err(ConfigError::NoCommands { owner });
                }
                if job.timeout_secs == Some(0) {
                    return Err(ConfigError::ZeroTimeout { owner });
                }

                if let Some(deploy) = &job.deploy {
                    if deploy.commands.is_empty() {
                        return Err(ConfigError::NoCommands {
                            owner: format!("deploy '{}' of {}", deploy.provider, owner),
                        });
                    }
                }
            }
        }

        // Conditions are only checked by compiling them
        Pipeline::from_config(self).map(|_| ())
    }

    /// Total number of jobs across all stages
    pub fn job_count(&self) -> usize {
        self.stages.iter().map(|s| s.jobs.len()).sum()
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Result<Pipeline, ConfigError> {
        Pipeline::from_config(self)
    }
}

/// Compile an optional condition string, naming its owner on failure
pub(crate) fn compile_condition(
    condition: Option<&str>,
    owner: impl FnOnce() -> String,
) -> Result<Option<Predicate>, ConfigError> {
    condition
        .map(|src| {
            Predicate::parse(src).map_err(|source| ConfigError::Predicate {
                owner: owner(),
                source,
            })
        })
        .transpose()
}
