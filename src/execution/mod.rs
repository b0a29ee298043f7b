//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod plan;

pub use engine::{EventHandler, ExecutionEvent, PipelineEvaluator};
pub use executor::{merge_env, template_variables, ExecutionResult, ScriptExecutor, ScriptOwner};
pub use plan::{ExecutionPlan, PlannedDeploy, PlannedJob, PlannedStage};
