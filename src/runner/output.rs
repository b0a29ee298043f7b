//! Command output types

use std::time::Duration;
use thiserror::Error;

/// Error types for runner operations
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("timed out after {0} seconds")]
    Timeout(u64),

    #[error("failed waiting for `{command}`: {reason}")]
    Wait { command: String, reason: String },
}

/// Output of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code (None when the process was killed by a signal)
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    pub duration: Duration,
}

impl CommandOutput {
    /// Create an output with the given exit code and no captured text
    pub fn with_exit_code(exit_code: i32) -> Self {
        Self {
            exit_code: Some(exit_code),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, trimmed
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        match (stdout.is_empty(), stderr.is_empty()) {
            (_, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{}\n{}", stdout, stderr),
        }
    }
}
