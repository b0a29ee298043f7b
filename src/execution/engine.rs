//! Pipeline evaluator - walks stages and jobs for one trigger context

use crate::{
    core::{
        DeployAction, DeployResult, DeployStatus, ExecutionStatus, Job, JobResult, JobStatus,
        Pipeline, RunReport, SkipReason, Stage, StageOutcome, StageReport, TriggerContext,
    },
    execution::{merge_env, template_variables, ExecutionResult, ScriptExecutor, ScriptOwner},
    runner::CommandRunner,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline evaluation
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        context: TriggerContext,
    },
    StageStarted {
        stage: String,
        job_count: usize,
    },
    /// The stage predicate was false
    StageSkipped {
        stage: String,
    },
    /// An earlier stage failed
    StageNotReached {
        stage: String,
    },
    JobStarted {
        stage: String,
        job: String,
    },
    JobSkipped {
        stage: String,
        job: String,
        reason: SkipReason,
    },
    CommandStarted {
        stage: String,
        job: String,
        command: String,
    },
    CommandFinished {
        stage: String,
        job: String,
        command: String,
        exit_code: Option<i32>,
        output: String,
    },
    JobFinished {
        result: JobResult,
    },
    DeployStarted {
        stage: String,
        job: String,
        provider: String,
    },
    DeployFinished {
        result: DeployResult,
    },
    StageFinished {
        stage: String,
        outcome: StageOutcome,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Evaluates a pipeline against a trigger context
///
/// Stages run strictly in order and jobs within a stage run strictly in
/// order. The first required failure skips the rest of its stage and leaves
/// every later stage unreached.
pub struct PipelineEvaluator<R> {
    executor: ScriptExecutor<R>,
    event_handlers: Vec<EventHandler>,
}

impl<R: CommandRunner> PipelineEvaluator<R> {
    pub fn new(runner: R) -> Self {
        Self {
            executor: ScriptExecutor::new(runner),
            event_handlers: Vec::new(),
        }
    }

    pub fn runner(&self) -> &R {
        self.executor.runner()
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Run the pipeline for one trigger
    ///
    /// Never fails: every command failure is recorded in the report, and
    /// [`RunReport::to_result`] maps it onto the error taxonomy.
    pub async fn evaluate(&self, pipeline: &Pipeline, context: &TriggerContext) -> RunReport {
        let mut report = RunReport::start(&pipeline.name, context);

        info!(
            "Starting pipeline {} ({}) for {} event{}",
            pipeline.name,
            report.execution_id,
            context.event(),
            context.git_ref().map(|r| format!(" on {}", r)).unwrap_or_default()
        );
        self.emit(ExecutionEvent::PipelineStarted {
            execution_id: report.execution_id,
            pipeline_name: pipeline.name.clone(),
            context: context.clone(),
        });

        let base_env = merge_env(&[&context.as_env(), &pipeline.env]);
        let mut halted = false;

        for stage in &pipeline.stages {
            let outcome = if halted {
                debug!("Stage {} not reached", stage.name);
                self.emit(ExecutionEvent::StageNotReached {
                    stage: stage.name.clone(),
                });
                StageOutcome::NotReached
            } else if !stage.should_run(context) {
                info!("Skipping stage {}: condition not met", stage.name);
                self.emit(ExecutionEvent::StageSkipped {
                    stage: stage.name.clone(),
                });
                StageOutcome::Skipped
            } else {
                let outcome = self.run_stage(stage, context, &base_env, &mut report).await;
                self.emit(ExecutionEvent::StageFinished {
                    stage: stage.name.clone(),
                    outcome,
                });
                outcome
            };

            halted |= outcome == StageOutcome::Failed;
            report.stages.push(StageReport {
                name: stage.name.clone(),
                outcome,
            });
        }

        report.finish();

        match report.status {
            ExecutionStatus::Completed => info!(
                "Pipeline {} completed: {} passed, {} failed, {} skipped",
                pipeline.name,
                report.passed_count(),
                report.failed_count(),
                report.skipped_count()
            ),
            _ => error!("Pipeline {} failed", pipeline.name),
        }
        self.emit(ExecutionEvent::PipelineCompleted {
            execution_id: report.execution_id,
            status: report.status,
        });

        report
    }

    async fn run_stage(
        &self,
        stage: &Stage,
        context: &TriggerContext,
        base_env: &HashMap<String, String>,
        report: &mut RunReport,
    ) -> StageOutcome {
        info!("Stage {} ({} jobs)", stage.name, stage.jobs.len());
        self.emit(ExecutionEvent::StageStarted {
            stage: stage.name.clone(),
            job_count: stage.jobs.len(),
        });

        let mut aborted = false;
        for job in &stage.jobs {
            let result = if aborted {
                JobResult::skipped(&stage.name, &job.name, SkipReason::StageAborted)
            } else if !job.should_run(context) {
                info!("Skipping job {}/{}: condition not met", stage.name, job.name);
                JobResult::skipped(&stage.name, &job.name, SkipReason::Predicate)
            } else {
                self.run_job(stage, job, context, base_env).await
            };

            match result.status {
                JobStatus::Skipped(reason) => self.emit(ExecutionEvent::JobSkipped {
                    stage: stage.name.clone(),
                    job: job.name.clone(),
                    reason,
                }),
                _ => self.emit(ExecutionEvent::JobFinished {
                    result: result.clone(),
                }),
            }

            aborted |= result.is_required_failure();
            report.job_results.push(result);
        }

        if aborted {
            return StageOutcome::Failed;
        }

        let mut deploy_failed = false;
        for job in &stage.jobs {
            let Some(deploy) = &job.deploy else {
                continue;
            };

            let job_passed = report
                .job_result(&stage.name, &job.name)
                .is_some_and(|r| r.status == JobStatus::Passed);

            let result = if !job_passed || report.has_failed() || !deploy.should_run(context) {
                debug!("Deploy {} of {}/{} skipped", deploy.provider, stage.name, job.name);
                DeployResult {
                    stage: stage.name.clone(),
                    job: job.name.clone(),
                    provider: deploy.provider.clone(),
                    status: DeployStatus::Skipped,
                    exit_code: None,
                }
            } else {
                self.run_deploy(stage, job, deploy, context, base_env).await
            };

            deploy_failed |= result.status == DeployStatus::Failed;
            self.emit(ExecutionEvent::DeployFinished {
                result: result.clone(),
            });
            report.deploys.push(result);
        }

        if deploy_failed {
            StageOutcome::Failed
        } else {
            StageOutcome::Passed
        }
    }

    async fn run_job(
        &self,
        stage: &Stage,
        job: &Job,
        context: &TriggerContext,
        base_env: &HashMap<String, String>,
    ) -> JobResult {
        info!("Running job {}/{}", stage.name, job.name);
        self.emit(ExecutionEvent::JobStarted {
            stage: stage.name.clone(),
            job: job.name.clone(),
        });

        let env = merge_env(&[base_env, &job.env]);
        let variables = template_variables(&env, context);
        let owner = ScriptOwner {
            stage: &stage.name,
            job: &job.name,
        };
        let emit = |event: ExecutionEvent| self.emit(event);

        let started = Instant::now();
        let result = self
            .executor
            .execute(owner, &job.commands, &env, &variables, job.timeout_secs, &emit)
            .await;
        let duration = started.elapsed();

        match result {
            ExecutionResult::Success { commands_run } => {
                info!("Job {}/{} passed ({} commands)", stage.name, job.name, commands_run);
                JobResult::passed(&stage.name, &job.name, duration)
                    .with_allow_failure(job.allow_failure)
            }
            ExecutionResult::Failed {
                command,
                exit_code,
                error,
                ..
            } => {
                if job.allow_failure {
                    warn!(
                        "Job {}/{} failed but is allowed to fail: `{}` {}",
                        stage.name, job.name, command, error
                    );
                } else {
                    error!("Job {}/{} failed: `{}` {}", stage.name, job.name, command, error);
                }
                JobResult::failed(&stage.name, &job.name, command, exit_code, duration)
                    .with_allow_failure(job.allow_failure)
            }
        }
    }

    async fn run_deploy(
        &self,
        stage: &Stage,
        job: &Job,
        deploy: &DeployAction,
        context: &TriggerContext,
        base_env: &HashMap<String, String>,
    ) -> DeployResult {
        info!("Deploying {}/{} via {}", stage.name, job.name, deploy.provider);
        self.emit(ExecutionEvent::DeployStarted {
            stage: stage.name.clone(),
            job: job.name.clone(),
            provider: deploy.provider.clone(),
        });

        let env = merge_env(&[base_env, &job.env, &deploy.env]);
        let variables = template_variables(&env, context);
        let owner = ScriptOwner {
            stage: &stage.name,
            job: &job.name,
        };
        let emit = |event: ExecutionEvent| self.emit(event);

        let result = self
            .executor
            .execute(owner, &deploy.commands, &env, &variables, job.timeout_secs, &emit)
            .await;

        let (status, exit_code) = match result {
            ExecutionResult::Success { .. } => (DeployStatus::Succeeded, Some(0)),
            ExecutionResult::Failed { exit_code, error, .. } => {
                error!("Deploy {} of {}/{} failed: {}", deploy.provider, stage.name, job.name, error);
                (DeployStatus::Failed, exit_code)
            }
        };

        DeployResult {
            stage: stage.name.clone(),
            job: job.name.clone(),
            provider: deploy.provider.clone(),
            status,
            exit_code,
        }
    }
}
