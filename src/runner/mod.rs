//! Command runners - the seam between the evaluator and the operating system

pub mod config;
pub mod output;
pub mod shell;

use async_trait::async_trait;
use std::collections::HashMap;

pub use config::RunnerConfig;
pub use output::{CommandOutput, RunnerError};
pub use shell::ShellRunner;

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run one command to completion with the given environment overrides
    ///
    /// A non-zero exit is not an error: it is reported through
    /// [`CommandOutput::exit_code`]. Errors mean the command could not be
    /// run at all.
    async fn run(
        &self,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, RunnerError>;
}
