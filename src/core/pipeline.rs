//! Pipeline domain model

use crate::core::{
    condition::Predicate,
    config::{compile_condition, PipelineConfig, StageConfig, DEFAULT_TIMEOUT_SECS},
    context::TriggerContext,
    error::ConfigError,
    job::{Job, JobDefaults},
};
use std::collections::HashMap;

/// A pipeline definition
///
/// Loaded once per run and treated as immutable configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Environment shared by every job
    pub env: HashMap<String, String>,

    /// Stages in execution order
    pub stages: Vec<Stage>,
}

/// A named, ordered group of jobs
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub condition: Option<Predicate>,
    pub jobs: Vec<Job>,
}

impl Pipeline {
    /// Create a pipeline from configuration, compiling every condition
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let defaults = JobDefaults {
            timeout_secs: config.default_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        let stages = config
            .stages
            .iter()
            .map(|stage| Stage::from_config(stage, &defaults))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Pipeline {
            name: config.name.clone(),
            env: config.env.clone(),
            stages,
        })
    }

    /// Get a stage by name
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Get a job by stage and job name
    pub fn job(&self, stage: &str, job: &str) -> Option<&Job> {
        self.stage(stage).and_then(|s| s.job(job))
    }

    /// Total number of jobs across all stages
    pub fn job_count(&self) -> usize {
        self.stages.iter().map(|s| s.jobs.len()).sum()
    }
}

impl Stage {
    fn from_config(config: &StageConfig, defaults: &JobDefaults) -> Result<Self, ConfigError> {
        let condition = compile_condition(config.condition.as_deref(), || {
            format!("stage '{}'", config.name)
        })?;

        let jobs = config
            .jobs
            .iter()
            .map(|job| Job::from_config(job, &config.name, defaults))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Stage {
            name: config.name.clone(),
            condition,
            jobs,
        })
    }

    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// Check the stage predicate against the trigger context
    pub fn should_run(&self, ctx: &TriggerContext) -> bool {
        self.condition.as_ref().map_or(true, |c| c.evaluate(ctx))
    }
}
