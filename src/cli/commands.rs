//! CLI command definitions

use crate::core::{EventType, TriggerContext};
use clap::builder::FalseyValueParser;
use clap::Args;
use std::path::PathBuf;
use uuid::Uuid;

/// Describes the event being evaluated
///
/// Every flag falls back to the variable a CI system would export.
#[derive(Debug, Args, Clone)]
pub struct TriggerArgs {
    /// Event type
    #[arg(long, value_enum, env = "CI_EVENT_TYPE", default_value_t = EventArg::Push)]
    pub event: EventArg,

    /// Branch the event refers to
    #[arg(long, env = "CI_BRANCH")]
    pub branch: Option<String>,

    /// Tag the event refers to
    #[arg(long, env = "CI_TAG")]
    pub tag: Option<String>,

    /// The change comes from a fork
    #[arg(long, env = "CI_PULL_REQUEST_FORK", value_parser = FalseyValueParser::new())]
    pub fork: bool,

    /// Build counter
    #[arg(long, env = "CI_BUILD_NUMBER", default_value_t = 0)]
    pub build_number: u64,

    /// Explicit toggles for `vars.NAME` conditions (KEY=VALUE)
    #[arg(long = "var", value_parser = parse_key_value)]
    pub vars: Vec<(String, String)>,
}

impl TriggerArgs {
    /// Build the immutable context for this run
    pub fn to_context(&self) -> TriggerContext {
        let mut ctx = TriggerContext::new(self.event.into())
            .with_fork(self.fork)
            .with_build_number(self.build_number);

        if let Some(branch) = &self.branch {
            ctx = ctx.with_branch(branch.as_str());
        }
        if let Some(tag) = &self.tag {
            ctx = ctx.with_tag(tag.as_str());
        }
        for (key, value) in &self.vars {
            ctx = ctx.with_var(key.as_str(), value.as_str());
        }

        ctx
    }
}

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub trigger: TriggerArgs,

    /// Pipeline environment overrides (KEY=VALUE)
    #[arg(long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Don't save execution to history
    #[arg(long)]
    pub no_history: bool,

    /// Shell used to run each command
    #[arg(long, default_value = "sh")]
    pub shell: String,

    /// Directory commands run in
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Don't inherit this process's environment
    #[arg(long)]
    pub clean_env: bool,
}

/// Show what a trigger would run
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub trigger: TriggerArgs,

    /// Pipeline environment overrides (KEY=VALUE)
    #[arg(long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List pipelines with recorded runs
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show execution counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show execution history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent executions to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a single execution
    #[arg(long)]
    pub execution_id: Option<Uuid>,
}

/// Event type argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventArg {
    Push,
    #[value(alias = "pull_request", alias = "pr")]
    PullRequest,
    Cron,
    Tag,
}

impl From<EventArg> for EventType {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Push => EventType::Push,
            EventArg::PullRequest => EventType::PullRequest,
            EventArg::Cron => EventType::Cron,
            EventArg::Tag => EventType::Tag,
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
