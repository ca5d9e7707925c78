// src/client/model.rs

//! Engine-side records and request filters.
//!
//! These types are the vocabulary shared by every [`EngineClient`]
//! implementation. Field names follow Rust conventions; the HTTP adapter
//! maps them to the engine's camelCase wire names.
//!
//! [`EngineClient`]: super::EngineClient

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{InstanceState, TaskState};

/// Variables attached to instances, jobs and task completions.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// Opaque engine-assigned identity.
///
/// The engine encodes keys as JSON numbers in some APIs and as strings in
/// others; both decode into the same string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EngineKey(String);

impl EngineKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EngineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EngineKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for EngineKey {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for EngineKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumOrString {
            Num(i64),
            Str(String),
        }

        Ok(match NumOrString::deserialize(deserializer)? {
            NumOrString::Num(n) => EngineKey(n.to_string()),
            NumOrString::Str(s) => EngineKey(s),
        })
    }
}

/// Human task identity.
pub type TaskId = EngineKey;

/// A deployed workflow template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDefinition {
    pub key: EngineKey,
    pub process_id: String,
    pub name: Option<String>,
    pub version: Option<i64>,
    pub tenant_id: Option<String>,
}

/// One execution of a process definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInstance {
    pub key: EngineKey,
    pub process_id: String,
    pub state: InstanceState,
    pub tenant_id: Option<String>,
    pub variables: Variables,
}

/// A unit of work requiring a manual claim and completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanTask {
    pub id: TaskId,
    pub name: Option<String>,
    pub process_instance_key: Option<EngineKey>,
    pub process_definition_key: Option<EngineKey>,
    pub state: TaskState,
    pub assignee: Option<String>,
    pub tenant_id: Option<String>,
}

/// A unit of automated work delivered to a registered worker.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomatedJob {
    pub key: EngineKey,
    pub job_type: String,
    pub process_instance_key: Option<EngineKey>,
    pub retries: Option<i32>,
    pub variables: Variables,
}

/// Cluster topology summary, used as a startup connectivity check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Topology {
    pub cluster_size: Option<u32>,
    pub broker_count: usize,
    pub gateway_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionFilter {
    pub process_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceFilter {
    pub process_id: String,
    pub state: InstanceState,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    pub state: TaskState,
    pub tenant_id: Option<String>,
}

/// Arguments for synchronous "create and await result" instance creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInstance {
    pub process_id: String,
    pub variables: Variables,
    pub tenant_id: Option<String>,
    pub timeout: Duration,
}

/// Parameters of a standing automated-job subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSubscription {
    pub task_type: String,
    pub worker_name: String,
    pub max_jobs: u32,
    pub job_timeout: Duration,
}

/// Build a [`Variables`] map from a JSON object literal.
///
/// Non-object values yield an empty map.
pub fn variables(value: serde_json::Value) -> Variables {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Variables::new(),
    }
}
