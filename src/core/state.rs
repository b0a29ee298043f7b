//! Execution state models

use crate::core::{context::TriggerContext, error::PipelineError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline is currently running
    Running,
    /// Every required job passed or was skipped
    Completed,
    /// A required job or a deploy failed
    Failed,
}

/// Why a job was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The job's own predicate was false
    Predicate,
    /// An earlier job in the same stage failed
    StageAborted,
}

/// Final status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Passed,
    Failed,
    Skipped(SkipReason),
}

impl JobStatus {
    pub fn is_skipped(&self) -> bool {
        matches!(self, JobStatus::Skipped(_))
    }
}

/// Outcome of a single job, never mutated after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub stage: String,
    pub job: String,
    pub status: JobStatus,

    /// Exit code of the last command run (None when skipped, timed out or not spawned)
    pub exit_code: Option<i32>,

    /// The command that failed, if any
    pub failed_command: Option<String>,

    /// Failures of this job do not fail the pipeline
    pub allow_failure: bool,

    pub duration: Duration,
}

impl JobResult {
    pub fn passed(stage: &str, job: &str, duration: Duration) -> Self {
        Self {
            stage: stage.to_string(),
            job: job.to_string(),
            status: JobStatus::Passed,
            exit_code: Some(0),
            failed_command: None,
            allow_failure: false,
            duration,
        }
    }

    pub fn failed(
        stage: &str,
        job: &str,
        command: String,
        exit_code: Option<i32>,
        duration: Duration,
    ) -> Self {
        Self {
            stage: stage.to_string(),
            job: job.to_string(),
            status: JobStatus::Failed,
            exit_code,
            failed_command: Some(command),
            allow_failure: false,
            duration,
        }
    }

    pub fn skipped(stage: &str, job: &str, reason: SkipReason) -> Self {
        Self {
            stage: stage.to_string(),
            job: job.to_string(),
            status: JobStatus::Skipped(reason),
            exit_code: None,
            failed_command: None,
            allow_failure: false,
            duration: Duration::ZERO,
        }
    }

    pub fn with_allow_failure(mut self, allow_failure: bool) -> Self {
        self.allow_failure = allow_failure;
        self
    }

    /// A failure that stops the stage and fails the pipeline
    pub fn is_required_failure(&self) -> bool {
        self.status == JobStatus::Failed && !self.allow_failure
    }
}

/// What happened to a stage as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Every required job passed or was skipped, and no deploy failed
    Passed,
    /// A required job or a deploy failed
    Failed,
    /// The stage predicate was false; no job results
    Skipped,
    /// An earlier stage failed; no job results
    NotReached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    pub outcome: StageOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Outcome of a deploy action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResult {
    pub stage: String,
    pub job: String,
    pub provider: String,
    pub status: DeployStatus,
    pub exit_code: Option<i32>,
}

/// Everything a pipeline run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub execution_id: Uuid,
    pub pipeline_name: String,
    pub context: TriggerContext,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    /// One entry per job of every reached stage, in execution order
    pub job_results: Vec<JobResult>,

    /// One entry per stage, in pipeline order
    pub stages: Vec<StageReport>,

    pub deploys: Vec<DeployResult>,
}

impl RunReport {
    /// Start a report for a new run
    pub fn start(pipeline_name: &str, context: &TriggerContext) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.to_string(),
            context: context.clone(),
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            job_results: Vec::new(),
            stages: Vec::new(),
            deploys: Vec::new(),
        }
    }

    /// Close the report, deriving the overall status
    pub fn finish(&mut self) {
        self.status = if self.has_failed() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Completed
        };
        self.completed_at = Some(Utc::now());
    }

    pub fn has_failed(&self) -> bool {
        self.job_results.iter().any(JobResult::is_required_failure)
            || self.deploys.iter().any(|d| d.status == DeployStatus::Failed)
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    pub fn job_result(&self, stage: &str, job: &str) -> Option<&JobResult> {
        self.job_results
            .iter()
            .find(|r| r.stage == stage && r.job == job)
    }

    pub fn results_for_stage<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a JobResult> + 'a {
        self.job_results.iter().filter(move |r| r.stage == stage)
    }

    pub fn stage_outcome(&self, stage: &str) -> Option<StageOutcome> {
        self.stages.iter().find(|s| s.name == stage).map(|s| s.outcome)
    }

    pub fn deploy_result(&self, stage: &str, job: &str) -> Option<&DeployResult> {
        self.deploys.iter().find(|d| d.stage == stage && d.job == job)
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.job_results.iter().filter(|r| r.status == status).count()
    }

    pub fn passed_count(&self) -> usize {
        self.count(JobStatus::Passed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(JobStatus::Failed)
    }

    pub fn skipped_count(&self) -> usize {
        self.job_results.iter().filter(|r| r.status.is_skipped()).count()
    }

    /// Map the report onto the failure taxonomy
    ///
    /// The first required job failure wins over a deploy failure, since a
    /// deploy can only fail after its stage passed.
    pub fn to_result(&self) -> Result<(), PipelineError> {
        if let Some(failed) = self.job_results.iter().find(|r| r.is_required_failure()) {
            return Err(PipelineError::CommandFailure {
                stage: failed.stage.clone(),
                job: failed.job.clone(),
                command: failed.failed_command.clone().unwrap_or_default(),
                exit_code: failed.exit_code,
            });
        }

        if let Some(deploy) = self.deploys.iter().find(|d| d.status == DeployStatus::Failed) {
            return Err(PipelineError::DeployFailure {
                job: deploy.job.clone(),
                provider: deploy.provider.clone(),
                exit_code: deploy.exit_code,
            });
        }

        Ok(())
    }
}
