// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::client::Variables;
use crate::client::model::variables;
use crate::types::TaskScope;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [engine]
/// zeebe_address = "http://localhost:8080"
///
/// [process]
/// process_id = "c8-sdk-demo"
///
/// [process.variables]
/// humanTaskStatus = "Needs doing"
///
/// [worker]
/// task_type = "service-task"
///
/// [human_tasks]
/// assignee = "demo-app-assignee"
/// poll_interval = "3s"
/// ```
///
/// Every section is optional and every key has a default, except the
/// engine connection settings, which may instead come from the environment.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: RawEngineSection,

    #[serde(default)]
    pub process: RawProcessSection,

    #[serde(default)]
    pub worker: RawWorkerSection,

    #[serde(default)]
    pub human_tasks: RawHumanTaskSection,
}

/// `[engine]` section.
///
/// Keys are named after the environment variables that override them.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEngineSection {
    #[serde(default)]
    pub zeebe_address: Option<String>,
    #[serde(default)]
    pub zeebe_client_id: Option<String>,
    #[serde(default)]
    pub zeebe_client_secret: Option<String>,
    #[serde(default)]
    pub camunda_operate_base_url: Option<String>,
    #[serde(default)]
    pub camunda_tasklist_base_url: Option<String>,

    /// Per-request HTTP timeout, e.g. `"30s"`.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
}

impl Default for RawEngineSection {
    fn default() -> Self {
        Self {
            zeebe_address: None,
            zeebe_client_id: None,
            zeebe_client_secret: None,
            camunda_operate_base_url: None,
            camunda_tasklist_base_url: None,
            request_timeout: default_request_timeout(),
        }
    }
}

/// `[process]` section: the process kept running by the reconciler.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProcessSection {
    #[serde(default = "default_process_id")]
    pub process_id: String,

    /// Tenant to search and create in. An empty string disables tenant
    /// filtering.
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound for "create and await result".
    #[serde(default = "default_create_timeout")]
    pub create_timeout: String,

    /// Run the reconciler at startup.
    #[serde(default = "default_true")]
    pub reconcile: bool,

    /// Variables for a newly created instance.
    #[serde(default = "default_initial_variables")]
    pub variables: Variables,
}

impl Default for RawProcessSection {
    fn default() -> Self {
        Self {
            process_id: default_process_id(),
            tenant_id: default_tenant_id(),
            page_size: default_page_size(),
            create_timeout: default_create_timeout(),
            reconcile: true,
            variables: default_initial_variables(),
        }
    }
}

/// `[worker]` section: the automated-job subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkerSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_task_type")]
    pub task_type: String,

    #[serde(default = "default_worker_name")]
    pub worker_name: String,

    #[serde(default = "default_max_jobs")]
    pub max_jobs: u32,

    /// Lease granted to this worker per activated job.
    #[serde(default = "default_job_timeout")]
    pub job_timeout: String,

    /// Variables every job is completed with.
    #[serde(default = "default_worker_outcome")]
    pub outcome: Variables,
}

impl Default for RawWorkerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            task_type: default_task_type(),
            worker_name: default_worker_name(),
            max_jobs: default_max_jobs(),
            job_timeout: default_job_timeout(),
            outcome: default_worker_outcome(),
        }
    }
}

/// `[human_tasks]` section: the poll/claim/complete loop.
#[derive(Debug, Clone, Deserialize)]
pub struct RawHumanTaskSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_assignee")]
    pub assignee: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// `"all"` claims every CREATED task; `"process"` only tasks of
    /// `process.process_id`.
    #[serde(default)]
    pub scope: TaskScope,

    /// Restrict the task search to `process.tenant_id`.
    #[serde(default)]
    pub tenant_filter: bool,

    /// Variables every task is completed with.
    #[serde(default = "default_task_outcome")]
    pub outcome: Variables,
}

impl Default for RawHumanTaskSection {
    fn default() -> Self {
        Self {
            enabled: true,
            assignee: default_assignee(),
            poll_interval: default_poll_interval(),
            scope: TaskScope::default(),
            tenant_filter: false,
            outcome: default_task_outcome(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

fn default_process_id() -> String {
    "c8-sdk-demo".to_string()
}

fn default_tenant_id() -> String {
    "<default>".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_create_timeout() -> String {
    "120s".to_string()
}

fn default_initial_variables() -> Variables {
    variables(json!({ "humanTaskStatus": "Needs doing" }))
}

fn default_task_type() -> String {
    "service-task".to_string()
}

fn default_worker_name() -> String {
    "flowkeeper".to_string()
}

fn default_max_jobs() -> u32 {
    32
}

fn default_job_timeout() -> String {
    "60s".to_string()
}

fn default_worker_outcome() -> Variables {
    variables(json!({ "serviceTaskOutcome": "We did it!" }))
}

fn default_assignee() -> String {
    "demo-app-assignee".to_string()
}

fn default_poll_interval() -> String {
    "3s".to_string()
}

fn default_task_outcome() -> Variables {
    variables(json!({ "humanTaskStatus": "Got done" }))
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

/// Validated configuration. Built from [`RawConfigFile`] via `TryFrom`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub engine: EngineConfig,
    pub process: ProcessConfig,
    pub worker: WorkerConfig,
    pub human_tasks: HumanTaskConfig,
}

/// Connection settings as written in the file; environment overrides are
/// applied later by [`crate::config::resolve_endpoints`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub zeebe_address: Option<String>,
    pub zeebe_client_id: Option<String>,
    pub zeebe_client_secret: Option<String>,
    pub camunda_operate_base_url: Option<String>,
    pub camunda_tasklist_base_url: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    pub process_id: String,
    pub tenant_id: Option<String>,
    pub page_size: u32,
    pub create_timeout: Duration,
    pub reconcile: bool,
    pub variables: Variables,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub task_type: String,
    pub worker_name: String,
    pub max_jobs: u32,
    pub job_timeout: Duration,
    pub outcome: Variables,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HumanTaskConfig {
    pub enabled: bool,
    pub assignee: String,
    pub poll_interval: Duration,
    pub scope: TaskScope,
    pub tenant_filter: bool,
    pub outcome: Variables,
}
