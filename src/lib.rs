//! stageline - evaluate staged CI pipelines for a trigger event

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use core::{
    ConfigError, EventType, ExecutionStatus, JobResult, JobStatus, Pipeline, PipelineConfig,
    PipelineError, Predicate, RunReport, SkipReason, StageOutcome, TriggerContext,
};
pub use execution::{ExecutionEvent, ExecutionPlan, PipelineEvaluator};
pub use runner::{CommandOutput, CommandRunner, RunnerConfig, RunnerError, ShellRunner};
