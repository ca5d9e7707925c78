#![allow(dead_code)]

use serde_json::Value;

use flowkeeper::client::model::variables;
use flowkeeper::client::{AutomatedJob, EngineKey, HumanTask};
use flowkeeper::config::{ConfigFile, RawConfigFile};
use flowkeeper::types::{TaskScope, TaskState};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults with every engine setting filled in,
/// so the result resolves without any environment.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.engine.zeebe_address = Some("http://zeebe.test".to_string());
        config.engine.zeebe_client_id = Some("test-client".to_string());
        config.engine.zeebe_client_secret = Some("test-secret".to_string());
        config.engine.camunda_operate_base_url = Some("http://operate.test".to_string());
        config.engine.camunda_tasklist_base_url = Some("http://tasklist.test".to_string());
        Self { config }
    }

    pub fn with_process_id(mut self, process_id: &str) -> Self {
        self.config.process.process_id = process_id.to_string();
        self
    }

    pub fn with_tenant(mut self, tenant_id: &str) -> Self {
        self.config.process.tenant_id = tenant_id.to_string();
        self
    }

    pub fn with_variables(mut self, value: Value) -> Self {
        self.config.process.variables = variables(value);
        self
    }

    pub fn with_create_timeout(mut self, timeout: &str) -> Self {
        self.config.process.create_timeout = timeout.to_string();
        self
    }

    pub fn without_reconcile(mut self) -> Self {
        self.config.process.reconcile = false;
        self
    }

    pub fn without_worker(mut self) -> Self {
        self.config.worker.enabled = false;
        self
    }

    pub fn with_task_type(mut self, task_type: &str) -> Self {
        self.config.worker.task_type = task_type.to_string();
        self
    }

    pub fn without_human_tasks(mut self) -> Self {
        self.config.human_tasks.enabled = false;
        self
    }

    pub fn with_assignee(mut self, assignee: &str) -> Self {
        self.config.human_tasks.assignee = assignee.to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: &str) -> Self {
        self.config.human_tasks.poll_interval = interval.to_string();
        self
    }

    pub fn with_scope(mut self, scope: TaskScope) -> Self {
        self.config.human_tasks.scope = scope;
        self
    }

    pub fn with_tenant_filter(mut self) -> Self {
        self.config.human_tasks.tenant_filter = true;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `HumanTask`. New tasks are unassigned and `CREATED`.
pub struct HumanTaskBuilder {
    task: HumanTask,
}

impl HumanTaskBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            task: HumanTask {
                id: EngineKey::new(id),
                name: Some(format!("Task {id}")),
                process_instance_key: None,
                process_definition_key: None,
                state: TaskState::Created,
                assignee: None,
                tenant_id: None,
            },
        }
    }

    pub fn in_process(mut self, definition_key: &EngineKey, instance_key: &EngineKey) -> Self {
        self.task.process_definition_key = Some(definition_key.clone());
        self.task.process_instance_key = Some(instance_key.clone());
        self
    }

    pub fn assigned_to(mut self, assignee: &str) -> Self {
        self.task.assignee = Some(assignee.to_string());
        self
    }

    pub fn state(mut self, state: TaskState) -> Self {
        self.task.state = state;
        self
    }

    pub fn tenant(mut self, tenant_id: &str) -> Self {
        self.task.tenant_id = Some(tenant_id.to_string());
        self
    }

    pub fn build(self) -> HumanTask {
        self.task
    }
}

/// Builder for `AutomatedJob`.
pub struct JobBuilder {
    job: AutomatedJob,
}

impl JobBuilder {
    pub fn new(key: &str, job_type: &str) -> Self {
        Self {
            job: AutomatedJob {
                key: EngineKey::new(key),
                job_type: job_type.to_string(),
                process_instance_key: None,
                retries: Some(3),
                variables: Default::default(),
            },
        }
    }

    pub fn variables(mut self, value: Value) -> Self {
        self.job.variables = variables(value);
        self
    }

    pub fn build(self) -> AutomatedJob {
        self.job
    }
}
