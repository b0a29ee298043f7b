//! Script executor - runs a job's or deploy's command sequence

use crate::{
    core::{render_command, TriggerContext},
    execution::ExecutionEvent,
    runner::{CommandRunner, RunnerError},
};
use std::collections::HashMap;
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{debug, error, info};

/// Result of executing a command sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Every command exited with status 0
    Success { commands_run: usize },
    /// A command failed; the remaining commands were not run
    Failed {
        command: String,
        exit_code: Option<i32>,
        error: String,
        commands_run: usize,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }
}

/// Which job a script belongs to, for events and logs
#[derive(Debug, Clone, Copy)]
pub struct ScriptOwner<'a> {
    pub stage: &'a str,
    pub job: &'a str,
}

/// Executes command sequences with a runner
pub struct ScriptExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> ScriptExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `commands` in order, stopping at the first failure
    ///
    /// Each command is rendered against `variables`. `timeout_secs` bounds
    /// the whole sequence, not each command; a timeout or spawn error counts
    /// as a failure with no exit code.
    pub async fn execute(
        &self,
        owner: ScriptOwner<'_>,
        commands: &[String],
        env: &HashMap<String, String>,
        variables: &HashMap<String, String>,
        timeout_secs: u64,
        emit: &(dyn Fn(ExecutionEvent) + Send + Sync),
    ) -> ExecutionResult {
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);

        for (index, template) in commands.iter().enumerate() {
            let command = render_command(template, variables);
            let commands_run = index + 1;

            info!("[{}/{}] $ {}", owner.stage, owner.job, command);
            emit(ExecutionEvent::CommandStarted {
                stage: owner.stage.to_string(),
                job: owner.job.to_string(),
                command: command.clone(),
            });

            let outcome = timeout_at(deadline, self.runner.run(&command, env))
                .await
            .unwrap_or(Err(RunnerError::Timeout(timeout_secs)));

            let output = match outcome {
                Ok(output) => output,
                Err(e) => {
                    error!("[{}/{}] `{}` could not complete: {}", owner.stage, owner.job, command, e);
                    emit(ExecutionEvent::CommandFinished {
                        stage: owner.stage.to_string(),
                        job: owner.job.to_string(),
                        command: command.clone(),
                        exit_code: None,
                        output: e.to_string(),
                    });
                    return ExecutionResult::Failed {
                        command,
                        exit_code: None,
                        error: e.to_string(),
                        commands_run,
                    };
                }
            };

            debug!(
                "[{}/{}] `{}` exited with {:?} after {:?}",
                owner.stage, owner.job, command, output.exit_code, output.duration
            );
            emit(ExecutionEvent::CommandFinished {
                stage: owner.stage.to_string(),
                job: owner.job.to_string(),
                command: command.clone(),
                exit_code: output.exit_code,
                output: output.combined(),
            });

            if !output.success() {
                let error = match output.exit_code {
                    Some(code) => format!("exited with code {}", code),
                    None => "terminated by signal".to_string(),
                };
                return ExecutionResult::Failed {
                    command,
                    exit_code: output.exit_code,
                    error,
                    commands_run,
                };
            }
        }

        ExecutionResult::Success {
            commands_run: commands.len(),
        }
    }
}

/// Merge environment layers; later layers win
pub fn merge_env(layers: &[&HashMap<String, String>]) -> HashMap<String, String> {
    let mut env = HashMap::new();
    for layer in layers {
        env.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    env
}

/// Variables for `{{ name }}` placeholders: the job environment plus the trigger context
///
/// Trigger values (branch, tag, `--var`) come from outside the pipeline file,
/// so they are shell-quoted before they can reach `sh -c`.
pub fn template_variables(
    env: &HashMap<String, String>,
    context: &TriggerContext,
) -> HashMap<String, String> {
    let mut vars = env.clone();
    vars.extend(
        context
            .template_variables()
            .into_iter()
            .map(|(key, value)| (key, shell_escape::unix::escape(value.into()).into_owned())),
    );
    vars
}
