//! Scenario-based tests for stageline

mod config_errors;
mod deploy;
mod environment;
mod job_predicates;
mod short_circuit;
mod stage_gating;
