// src/client/http.rs

//! HTTP/JSON adapter for a Camunda-8-style engine.
//!
//! Three services are involved:
//! - the gateway (`zeebe`) for instance creation, job activation/completion
//!   and topology (REST v2),
//! - the query API (`operate`) for definition and instance searches (v1),
//! - the task API (`tasklist`) for human task search, assignment and
//!   completion (v1).
//!
//! Every request carries HTTP basic credentials. Non-success statuses are
//! turned into [`FlowkeeperError::Engine`] with a truncated body.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::model::{
    AutomatedJob, CreateInstance, DefinitionFilter, EngineKey, HumanTask, InstanceFilter,
    JobSubscription, ProcessDefinition, ProcessInstance, TaskFilter, TaskId, Topology, Variables,
};
use super::{BoxFuture, EngineClient, WorkerHandle};
use crate::config::millis;
use crate::errors::{FlowkeeperError, Result};
use crate::types::{InstanceState, TaskState};
use crate::worker::{JobHandler, deliver_job};

/// How long the gateway may hold an activation request open.
const ACTIVATION_LONG_POLL: Duration = Duration::from_secs(10);

/// Pause after a failed activation before asking again.
const ACTIVATION_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Pause after an empty activation answer, for gateways that don't long-poll.
const ACTIVATION_IDLE_BACKOFF: Duration = Duration::from_millis(500);

/// Extra time granted to the HTTP call on top of the engine-side timeout.
const CREATE_GRACE: Duration = Duration::from_secs(5);

const ERROR_BODY_LIMIT: usize = 200;

/// Base URLs and credentials for the three engine services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEndpoints {
    pub zeebe_address: String,
    pub operate_base_url: String,
    pub tasklist_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub request_timeout: Duration,
}

/// Production [`EngineClient`] backed by `reqwest`.
///
/// Cloning is cheap and clones share the connection pool and the set of
/// running worker subscriptions.
#[derive(Debug, Clone)]
pub struct HttpEngineClient {
    http: Client,
    endpoints: Arc<EngineEndpoints>,
    workers: Arc<Mutex<Vec<AbortHandle>>>,
}

impl HttpEngineClient {
    pub fn new(endpoints: EngineEndpoints) -> Result<Self> {
        let http = Client::builder()
            .timeout(endpoints.request_timeout.max(ACTIVATION_LONG_POLL + CREATE_GRACE))
            .user_agent(concat!("flowkeeper/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoints: Arc::new(endpoints),
            workers: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn endpoints(&self) -> &EngineEndpoints {
        &self.endpoints
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.endpoints.client_id, Some(&self.endpoints.client_secret))
    }

    async fn send(&self, req: RequestBuilder) -> Result<reqwest::Response> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowkeeperError::Engine {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let response = self.send(req).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn activate_jobs(&self, subscription: &JobSubscription) -> Result<Vec<AutomatedJob>> {
        let url = Self::url(&self.endpoints.zeebe_address, "/v2/jobs/activation");
        let body = json!({
            "type": subscription.task_type,
            "worker": subscription.worker_name,
            "timeout": millis(subscription.job_timeout),
            "maxJobsToActivate": subscription.max_jobs,
            "requestTimeout": millis(ACTIVATION_LONG_POLL),
        });

        let response: ActivateJobsResponse =
            self.send_json(self.request(Method::POST, url).json(&body)).await?;
        Ok(response.jobs.into_iter().map(AutomatedJob::from).collect())
    }

    fn spawn_activation_loop(
        &self,
        subscription: JobSubscription,
        handler: Arc<dyn JobHandler>,
    ) -> tokio::task::JoinHandle<()> {
        let client = self.clone();

        tokio::spawn(async move {
            info!(
                target: "flowkeeper::worker",
                task_type = %subscription.task_type,
                "job activation loop started"
            );

            loop {
                match client.activate_jobs(&subscription).await {
                    Ok(jobs) if jobs.is_empty() => {
                        tokio::time::sleep(ACTIVATION_IDLE_BACKOFF).await;
                    }
                    Ok(jobs) => {
                        debug!(
                            target: "flowkeeper::worker",
                            task_type = %subscription.task_type,
                            count = jobs.len(),
                            "activated jobs"
                        );
                        for job in jobs {
                            let client = client.clone();
                            let handler = Arc::clone(&handler);
                            tokio::spawn(async move {
                                deliver_job(&client, handler.as_ref(), &job).await;
                            });
                        }
                    }
                    Err(err) => {
                        warn!(
                            target: "flowkeeper::worker",
                            task_type = %subscription.task_type,
                            error = %err,
                            "job activation failed; retrying"
                        );
                        tokio::time::sleep(ACTIVATION_ERROR_BACKOFF).await;
                    }
                }
            }
        })
    }

    fn track_worker(&self, handle: AbortHandle) {
        let mut workers = self
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        workers.retain(|h| !h.is_finished());
        workers.push(handle);
    }
}

impl EngineClient for HttpEngineClient {
    fn search_process_definitions<'a>(
        &'a self,
        filter: &'a DefinitionFilter,
        page_size: u32,
    ) -> BoxFuture<'a, Result<Vec<ProcessDefinition>>> {
        Box::pin(async move {
            let url = Self::url(&self.endpoints.operate_base_url, "/v1/process-definitions/search");
            let body = json!({
                "filter": { "bpmnProcessId": filter.process_id },
                "size": page_size,
            });

            let response: SearchResponse<OperateDefinition> =
                self.send_json(self.request(Method::POST, url).json(&body)).await?;
            Ok(response.items.into_iter().map(ProcessDefinition::from).collect())
        })
    }

    fn search_process_instances<'a>(
        &'a self,
        filter: &'a InstanceFilter,
        page_size: u32,
    ) -> BoxFuture<'a, Result<Vec<ProcessInstance>>> {
        Box::pin(async move {
            let url = Self::url(&self.endpoints.operate_base_url, "/v1/process-instances/search");
            let mut criteria = json!({
                "bpmnProcessId": filter.process_id,
                "state": filter.state.as_str(),
            });
            if let Some(tenant) = &filter.tenant_id {
                criteria["tenantId"] = Value::String(tenant.clone());
            }
            let body = json!({ "filter": criteria, "size": page_size });

            let response: SearchResponse<OperateInstance> =
                self.send_json(self.request(Method::POST, url).json(&body)).await?;
            Ok(response.items.into_iter().map(ProcessInstance::from).collect())
        })
    }

    fn create_process_instance_with_result<'a>(
        &'a self,
        request: &'a CreateInstance,
    ) -> BoxFuture<'a, Result<ProcessInstance>> {
        Box::pin(async move {
            let url = Self::url(&self.endpoints.zeebe_address, "/v2/process-instances");
            let mut body = json!({
                "processDefinitionId": request.process_id,
                "variables": request.variables,
                "awaitCompletion": true,
                "requestTimeout": millis(request.timeout),
            });
            if let Some(tenant) = &request.tenant_id {
                body["tenantId"] = Value::String(tenant.clone());
            }

            let req = self
                .request(Method::POST, url)
                .timeout(request.timeout + CREATE_GRACE)
                .json(&body);
            let response: CreateInstanceResponse = self.send_json(req).await?;

            Ok(ProcessInstance {
                key: response.process_instance_key,
                process_id: response
                    .process_definition_id
                    .unwrap_or_else(|| request.process_id.clone()),
                // Awaiting the result means the engine ran the instance to its end.
                state: InstanceState::Completed,
                tenant_id: response.tenant_id.or_else(|| request.tenant_id.clone()),
                variables: response.variables.unwrap_or_default(),
            })
        })
    }

    fn register_automated_worker(
        &self,
        subscription: JobSubscription,
        handler: Arc<dyn JobHandler>,
    ) -> BoxFuture<'_, Result<WorkerHandle>> {
        Box::pin(async move {
            let task_type = subscription.task_type.clone();
            let task = self.spawn_activation_loop(subscription, handler);
            self.track_worker(task.abort_handle());
            Ok(WorkerHandle::spawned(task_type, task))
        })
    }

    fn complete_job<'a>(
        &'a self,
        job_key: &'a EngineKey,
        variables: Variables,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let url = Self::url(
                &self.endpoints.zeebe_address,
                &format!("/v2/jobs/{job_key}/completion"),
            );
            let body = json!({ "variables": variables });
            self.send(self.request(Method::POST, url).json(&body)).await?;
            Ok(())
        })
    }

    fn search_human_tasks<'a>(
        &'a self,
        filter: &'a TaskFilter,
    ) -> BoxFuture<'a, Result<Vec<HumanTask>>> {
        Box::pin(async move {
            let url = Self::url(&self.endpoints.tasklist_base_url, "/v1/tasks/search");
            let mut body = json!({ "state": filter.state.as_str() });
            if let Some(tenant) = &filter.tenant_id {
                body["tenantIds"] = json!([tenant]);
            }

            let tasks: Vec<TasklistTask> =
                self.send_json(self.request(Method::POST, url).json(&body)).await?;
            Ok(tasks.into_iter().map(HumanTask::from).collect())
        })
    }

    fn claim_human_task<'a>(
        &'a self,
        task_id: &'a TaskId,
        assignee: &'a str,
        allow_override: bool,
    ) -> BoxFuture<'a, Result<HumanTask>> {
        Box::pin(async move {
            let url = Self::url(
                &self.endpoints.tasklist_base_url,
                &format!("/v1/tasks/{task_id}/assign"),
            );
            let body = json!({
                "assignee": assignee,
                "allowOverrideAssignment": allow_override,
            });

            let task: TasklistTask = self
                .send_json(self.request(Method::PATCH, url).json(&body))
                .await
                .map_err(|err| match err {
                    FlowkeeperError::Engine { status: 400 | 409, body } => {
                        FlowkeeperError::ClaimConflict {
                            task_id: task_id.to_string(),
                            reason: body,
                        }
                    }
                    other => other,
                })?;
            Ok(HumanTask::from(task))
        })
    }

    fn complete_human_task<'a>(
        &'a self,
        task_id: &'a TaskId,
        variables: Variables,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let url = Self::url(
                &self.endpoints.tasklist_base_url,
                &format!("/v1/tasks/{task_id}/complete"),
            );
            let body = json!({ "variables": tasklist_variables(&variables)? });
            self.send(self.request(Method::PATCH, url).json(&body)).await?;
            Ok(())
        })
    }

    fn topology(&self) -> BoxFuture<'_, Result<Topology>> {
        Box::pin(async move {
            let url = Self::url(&self.endpoints.zeebe_address, "/v2/topology");
            let response: TopologyResponse =
                self.send_json(self.request(Method::GET, url)).await?;
            Ok(Topology {
                cluster_size: response.cluster_size,
                broker_count: response.brokers.len(),
                gateway_version: response.gateway_version,
            })
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let handles: Vec<AbortHandle> = self
                .workers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .drain(..)
                .collect();
            debug!(workers = handles.len(), "closing engine client");
            for handle in handles {
                handle.abort();
            }
            Ok(())
        })
    }
}

/// Task completion variables are sent as `{name, value}` pairs where the
/// value is itself JSON-encoded.
fn tasklist_variables(variables: &Variables) -> Result<Vec<Value>> {
    variables
        .iter()
        .map(|(name, value)| -> Result<Value> {
            Ok(json!({
                "name": name,
                "value": serde_json::to_string(value)?,
            }))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperateDefinition {
    key: EngineKey,
    bpmn_process_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<i64>,
    #[serde(default)]
    tenant_id: Option<String>,
}

impl From<OperateDefinition> for ProcessDefinition {
    fn from(d: OperateDefinition) -> Self {
        ProcessDefinition {
            key: d.key,
            process_id: d.bpmn_process_id,
            name: d.name,
            version: d.version,
            tenant_id: d.tenant_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperateInstance {
    key: EngineKey,
    bpmn_process_id: String,
    state: InstanceState,
    #[serde(default)]
    tenant_id: Option<String>,
}

impl From<OperateInstance> for ProcessInstance {
    fn from(i: OperateInstance) -> Self {
        ProcessInstance {
            key: i.key,
            process_id: i.bpmn_process_id,
            state: i.state,
            tenant_id: i.tenant_id,
            variables: Variables::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateInstanceResponse {
    process_instance_key: EngineKey,
    #[serde(default)]
    process_definition_id: Option<String>,
    #[serde(default)]
    tenant_id: Option<String>,
    #[serde(default)]
    variables: Option<Variables>,
}

#[derive(Debug, Deserialize)]
struct ActivateJobsResponse {
    #[serde(default)]
    jobs: Vec<ActivatedJob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivatedJob {
    job_key: EngineKey,
    #[serde(rename = "type")]
    job_type: String,
    #[serde(default)]
    process_instance_key: Option<EngineKey>,
    #[serde(default)]
    retries: Option<i32>,
    #[serde(default)]
    variables: Variables,
}

impl From<ActivatedJob> for AutomatedJob {
    fn from(j: ActivatedJob) -> Self {
        AutomatedJob {
            key: j.job_key,
            job_type: j.job_type,
            process_instance_key: j.process_instance_key,
            retries: j.retries,
            variables: j.variables,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopologyResponse {
    #[serde(default)]
    brokers: Vec<Value>,
    #[serde(default)]
    cluster_size: Option<u32>,
    #[serde(default)]
    gateway_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TasklistTask {
    id: EngineKey,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    process_instance_key: Option<EngineKey>,
    #[serde(default)]
    process_definition_key: Option<EngineKey>,
    task_state: TaskState,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    tenant_id: Option<String>,
}

impl From<TasklistTask> for HumanTask {
    fn from(t: TasklistTask) -> Self {
        HumanTask {
            id: t.id,
            name: t.name,
            process_instance_key: t.process_instance_key,
            process_definition_key: t.process_definition_key,
            state: t.task_state,
            assignee: t.assignee,
            tenant_id: t.tenant_id,
        }
    }
}
