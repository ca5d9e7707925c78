// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a process instance as reported by the engine.
///
/// Unknown states are kept verbatim so newer engines don't break decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Active,
    Completed,
    Canceled,
    Incident,
    #[serde(untagged)]
    Other(String),
}

impl InstanceState {
    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Active => "ACTIVE",
            InstanceState::Completed => "COMPLETED",
            InstanceState::Canceled => "CANCELED",
            InstanceState::Incident => "INCIDENT",
            InstanceState::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a human task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Created,
    Assigned,
    Completed,
    Canceled,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Created => "CREATED",
            TaskState::Assigned => "ASSIGNED",
            TaskState::Completed => "COMPLETED",
            TaskState::Canceled => "CANCELED",
            TaskState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which human tasks the poller is allowed to claim.
///
/// - `All`: every CREATED task visible to the assignee identity, regardless
///   of the process it belongs to (default).
/// - `Process`: only tasks whose process definition matches the configured
///   process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskScope {
    #[default]
    All,
    Process,
}

impl FromStr for TaskScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(TaskScope::All),
            "process" => Ok(TaskScope::Process),
            other => Err(format!(
                "invalid human_tasks.scope: {other} (expected \"all\" or \"process\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_instance_state_is_preserved() {
        let state: InstanceState = serde_json::from_str("\"TERMINATED\"").unwrap();
        assert_eq!(state, InstanceState::Other("TERMINATED".to_string()));
        assert_eq!(state.as_str(), "TERMINATED");

        let active: InstanceState = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(active, InstanceState::Active);
    }

    #[test]
    fn task_scope_parses_case_insensitively() {
        assert_eq!(" Process ".parse::<TaskScope>(), Ok(TaskScope::Process));
        assert_eq!("all".parse::<TaskScope>(), Ok(TaskScope::All));
        assert!("tenant".parse::<TaskScope>().is_err());
    }
}
