//! Execution plan - what a trigger would run, without running anything

use crate::{
    core::{render_command, Pipeline, TriggerContext},
    execution::{merge_env, template_variables},
};
use serde::Serialize;

/// Dry-run view of a pipeline for one trigger context
///
/// Assumes every command succeeds, so stages are only ever left out by
/// their own predicates.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub pipeline_name: String,
    pub stages: Vec<PlannedStage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedStage {
    pub name: String,
    pub runs: bool,
    pub jobs: Vec<PlannedJob>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedJob {
    pub name: String,
    pub runs: bool,
    pub allow_failure: bool,
    /// Commands with placeholders already substituted
    pub commands: Vec<String>,
    pub deploy: Option<PlannedDeploy>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedDeploy {
    pub provider: String,
    pub runs: bool,
}

impl ExecutionPlan {
    pub fn build(pipeline: &Pipeline, context: &TriggerContext) -> Self {
        let base_env = merge_env(&[&context.as_env(), &pipeline.env]);

        let stages = pipeline
            .stages
            .iter()
            .map(|stage| {
                let stage_runs = stage.should_run(context);
                let jobs = stage
                    .jobs
                    .iter()
                    .map(|job| {
                        let runs = stage_runs && job.should_run(context);
                        let env = merge_env(&[&base_env, &job.env]);
                        let variables = template_variables(&env, context);

                        PlannedJob {
                            name: job.name.clone(),
                            runs,
                            allow_failure: job.allow_failure,
                            commands: job
                                .commands
                                .iter()
                                .map(|c| render_command(c, &variables))
                                .collect(),
                            deploy: job.deploy.as_ref().map(|d| PlannedDeploy {
                                provider: d.provider.clone(),
                                runs: runs && d.should_run(context),
                            }),
                        }
                    })
                    .collect();

                PlannedStage {
                    name: stage.name.clone(),
                    runs: stage_runs,
                    jobs,
                }
            })
            .collect();

        Self {
            pipeline_name: pipeline.name.clone(),
            stages,
        }
    }

    /// `(stage, job)` pairs that would run, in execution order
    pub fn runnable_jobs(&self) -> impl Iterator<Item = (&str, &PlannedJob)> {
        self.stages.iter().flat_map(|stage| {
            stage
                .jobs
                .iter()
                .filter(|job| job.runs)
                .map(move |job| (stage.name.as_str(), job))
        })
    }

    pub fn job_count(&self) -> usize {
        self.runnable_jobs().count()
    }
}
