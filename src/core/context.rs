//! Trigger context - immutable facts about the event that started a run

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Kind of event that triggered the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Push,
    PullRequest,
    Cron,
    Tag,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Push => "push",
            EventType::PullRequest => "pull_request",
            EventType::Cron => "cron",
            EventType::Tag => "tag",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "push" => Ok(EventType::Push),
            "pull_request" | "pull-request" | "pr" => Ok(EventType::PullRequest),
            "cron" => Ok(EventType::Cron),
            "tag" => Ok(EventType::Tag),
            other => Err(format!(
                "unknown event type '{}' (expected push, pull_request, cron or tag)",
                other
            )),
        }
    }
}

/// Snapshot of the triggering event
///
/// Built once per run and never mutated afterwards; the evaluator only
/// ever holds a shared reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerContext {
    event: EventType,
    branch: Option<String>,
    tag: Option<String>,
    fork: bool,
    build_number: u64,
    /// Explicit toggles supplied by the invoker (`vars.NAME` in predicates)
    vars: BTreeMap<String, String>,
}

impl TriggerContext {
    /// Create a context for the given event with no ref information
    pub fn new(event: EventType) -> Self {
        Self {
            event,
            branch: None,
            tag: None,
            fork: false,
            build_number: 0,
            vars: BTreeMap::new(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    pub fn with_build_number(mut self, build_number: u64) -> Self {
        self.build_number = build_number;
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn event(&self) -> EventType {
        self.event
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn is_fork(&self) -> bool {
        self.fork
    }

    pub fn build_number(&self) -> u64 {
        self.build_number
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// The ref that best describes this build: the tag if present, else the branch
    pub fn git_ref(&self) -> Option<&str> {
        self.tag().or_else(|| self.branch())
    }

    /// Environment variables exported to every command of the run
    pub fn as_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("CI".to_string(), "true".to_string());
        env.insert("CI_EVENT_TYPE".to_string(), self.event.to_string());
        env.insert("CI_PULL_REQUEST_FORK".to_string(), self.fork.to_string());
        env.insert("CI_BUILD_NUMBER".to_string(), self.build_number.to_string());
        if let Some(branch) = &self.branch {
            env.insert("CI_BRANCH".to_string(), branch.clone());
        }
        if let Some(tag) = &self.tag {
            env.insert("CI_TAG".to_string(), tag.clone());
        }
        env
    }

    /// Values available to `{{ name }}` placeholders in commands
    pub fn template_variables(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("event".to_string(), self.event.to_string());
        vars.insert("fork".to_string(), self.fork.to_string());
        vars.insert("build_number".to_string(), self.build_number.to_string());
        vars.insert("branch".to_string(), self.branch.clone().unwrap_or_default());
        vars.insert("tag".to_string(), self.tag.clone().unwrap_or_default());
        for (key, value) in &self.vars {
            vars.insert(format!("vars.{}", key), value.clone());
        }
        vars
    }
}

impl Default for TriggerContext {
    fn default() -> Self {
        Self::new(EventType::Push)
    }
}
