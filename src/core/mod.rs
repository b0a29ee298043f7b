//! Core domain models for stageline
//!
//! This module defines the fundamental data structures that represent
//! pipelines, stages, jobs, trigger contexts and run results.

pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod state;

pub use condition::{Field, Predicate, PredicateError};
pub use config::{DeployConfig, JobConfig, PipelineConfig, StageConfig, DEFAULT_TIMEOUT_SECS};
pub use context::*;
pub use error::{ConfigError, PipelineError};
pub use job::*;
pub use pipeline::*;
pub use state::*;
