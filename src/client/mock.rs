// src/client/mock.rs

//! In-memory engine used by tests and local experiments.
//!
//! `InMemoryEngine` keeps definitions, instances and human tasks in a
//! mutex-guarded state, records every call in order, and can be told to
//! fail specific operations or specific tasks.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::model::{
    AutomatedJob, CreateInstance, DefinitionFilter, EngineKey, HumanTask, InstanceFilter,
    JobSubscription, ProcessDefinition, ProcessInstance, TaskFilter, TaskId, Topology, Variables,
};
use super::{BoxFuture, EngineClient, WorkerHandle};
use crate::errors::{FlowkeeperError, Result};
use crate::types::{InstanceState, TaskState};
use crate::worker::{JobDelivery, JobHandler, deliver_job};

const FIRST_KEY: u64 = 2_251_799_813_685_249;

/// One recorded call against the engine, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SearchDefinitions { process_id: String },
    SearchInstances { process_id: String, state: InstanceState },
    CreateInstance { process_id: String, variables: Variables },
    RegisterWorker { task_type: String },
    CompleteJob { job_key: EngineKey },
    SearchTasks { state: TaskState },
    ClaimTask { task_id: TaskId, assignee: String },
    CompleteTask { task_id: TaskId, variables: Variables },
    Topology,
    Close,
}

/// Operations that can be made to fail as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SearchDefinitions,
    SearchInstances,
    CreateInstance,
    SearchTasks,
    Topology,
}

#[derive(Default)]
struct EngineState {
    definitions: Vec<ProcessDefinition>,
    instances: Vec<ProcessInstance>,
    tasks: Vec<HumanTask>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    completed_jobs: Vec<(EngineKey, Variables)>,
    calls: Vec<EngineCall>,
    failing_operations: HashSet<Operation>,
    failing_claims: HashSet<TaskId>,
    failing_completions: HashSet<TaskId>,
    create_delay: Option<Duration>,
    awaited_task: Option<HumanTask>,
    next_key: u64,
    closed: bool,
}

/// Cloneable handle to a shared in-memory engine.
#[derive(Clone, Default)]
pub struct InMemoryEngine {
    state: Arc<Mutex<EngineState>>,
}

impl fmt::Debug for InMemoryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("InMemoryEngine")
            .field("definitions", &state.definitions.len())
            .field("instances", &state.instances.len())
            .field("tasks", &state.tasks.len())
            .field("calls", &state.calls.len())
            .finish_non_exhaustive()
    }
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_key(state: &mut EngineState) -> EngineKey {
        if state.next_key == 0 {
            state.next_key = FIRST_KEY;
        }
        let key = EngineKey::from(state.next_key);
        state.next_key += 1;
        key
    }

    /// Deploy a definition for `process_id` and return its key.
    pub fn deploy(&self, process_id: &str) -> EngineKey {
        let mut state = self.state();
        let key = Self::next_key(&mut state);
        state.definitions.push(ProcessDefinition {
            key: key.clone(),
            process_id: process_id.to_string(),
            name: Some(process_id.to_string()),
            version: Some(1),
            tenant_id: None,
        });
        key
    }

    /// Insert an instance as if it had been started elsewhere.
    pub fn add_instance(
        &self,
        process_id: &str,
        state: InstanceState,
        tenant_id: Option<&str>,
    ) -> EngineKey {
        let mut guard = self.state();
        let key = Self::next_key(&mut guard);
        guard.instances.push(ProcessInstance {
            key: key.clone(),
            process_id: process_id.to_string(),
            state,
            tenant_id: tenant_id.map(str::to_string),
            variables: Variables::new(),
        });
        key
    }

    pub fn add_task(&self, task: HumanTask) {
        self.state().tasks.push(task);
    }

    pub fn fail_operation(&self, op: Operation) {
        self.state().failing_operations.insert(op);
    }

    pub fn clear_failure(&self, op: Operation) {
        self.state().failing_operations.remove(&op);
    }

    /// Make every claim of `task_id` fail with a claim conflict.
    pub fn fail_claim(&self, task_id: impl Into<TaskId>) {
        self.state().failing_claims.insert(task_id.into());
    }

    /// Make every completion of `task_id` fail with a server error.
    pub fn fail_completion(&self, task_id: impl Into<TaskId>) {
        self.state().failing_completions.insert(task_id.into());
    }

    /// Delay instance creation, to exercise caller-side timeouts.
    pub fn delay_creation(&self, delay: Duration) {
        self.state().create_delay = Some(delay);
    }

    /// Model a process whose result depends on a human task: creation opens
    /// `task` and only resolves after it has been completed.
    pub fn await_task_on_create(&self, task: HumanTask) {
        self.state().awaited_task = Some(task);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }

    pub fn instances(&self) -> Vec<ProcessInstance> {
        self.state().instances.clone()
    }

    pub fn task(&self, task_id: &TaskId) -> Option<HumanTask> {
        self.state().tasks.iter().find(|t| &t.id == task_id).cloned()
    }

    pub fn completed_jobs(&self) -> Vec<(EngineKey, Variables)> {
        self.state().completed_jobs.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::CreateInstance { .. }))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn has_worker(&self, task_type: &str) -> bool {
        self.state().handlers.contains_key(task_type)
    }

    /// Push `job` to the worker registered for its type.
    ///
    /// Returns `None` when no worker is subscribed to that type.
    pub async fn deliver(&self, job: AutomatedJob) -> Option<JobDelivery> {
        let handler = self.state().handlers.get(&job.job_type).cloned()?;
        Some(deliver_job(self, handler.as_ref(), &job).await)
    }

    fn check(&self, state: &EngineState, op: Operation) -> Result<()> {
        if state.failing_operations.contains(&op) {
            return Err(FlowkeeperError::Engine {
                status: 503,
                body: format!("{op:?} unavailable"),
            });
        }
        Ok(())
    }
}

impl EngineClient for InMemoryEngine {
    fn search_process_definitions<'a>(
        &'a self,
        filter: &'a DefinitionFilter,
        page_size: u32,
    ) -> BoxFuture<'a, Result<Vec<ProcessDefinition>>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(EngineCall::SearchDefinitions {
                process_id: filter.process_id.clone(),
            });
            self.check(&state, Operation::SearchDefinitions)?;
            Ok(state
                .definitions
                .iter()
                .filter(|d| d.process_id == filter.process_id)
                .take(page_size as usize)
                .cloned()
                .collect())
        })
    }

    fn search_process_instances<'a>(
        &'a self,
        filter: &'a InstanceFilter,
        page_size: u32,
    ) -> BoxFuture<'a, Result<Vec<ProcessInstance>>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(EngineCall::SearchInstances {
                process_id: filter.process_id.clone(),
                state: filter.state.clone(),
            });
            self.check(&state, Operation::SearchInstances)?;
            Ok(state
                .instances
                .iter()
                .filter(|i| i.process_id == filter.process_id && i.state == filter.state)
                .filter(|i| match &filter.tenant_id {
                    Some(tenant) => i.tenant_id.as_deref() == Some(tenant.as_str()),
                    None => true,
                })
                .take(page_size as usize)
                .cloned()
                .collect())
        })
    }

    fn create_process_instance_with_result<'a>(
        &'a self,
        request: &'a CreateInstance,
    ) -> BoxFuture<'a, Result<ProcessInstance>> {
        Box::pin(async move {
            let (delay, awaited) = {
                let mut state = self.state();
                state.calls.push(EngineCall::CreateInstance {
                    process_id: request.process_id.clone(),
                    variables: request.variables.clone(),
                });
                self.check(&state, Operation::CreateInstance)?;
                if !state.definitions.iter().any(|d| d.process_id == request.process_id) {
                    return Err(FlowkeeperError::Engine {
                        status: 404,
                        body: format!("no process definition found for '{}'", request.process_id),
                    });
                }
                (state.create_delay, state.awaited_task.clone())
            };

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let instance_state = match awaited {
                Some(task) => {
                    let task_id = task.id.clone();
                    self.add_task(task);
                    while self
                        .task(&task_id)
                        .is_none_or(|t| t.state != TaskState::Completed)
                    {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    InstanceState::Completed
                }
                None => InstanceState::Active,
            };

            let mut state = self.state();
            let key = Self::next_key(&mut state);
            let instance = ProcessInstance {
                key,
                process_id: request.process_id.clone(),
                state: instance_state,
                tenant_id: request.tenant_id.clone(),
                variables: request.variables.clone(),
            };
            state.instances.push(instance.clone());
            Ok(instance)
        })
    }

    fn register_automated_worker(
        &self,
        subscription: JobSubscription,
        handler: Arc<dyn JobHandler>,
    ) -> BoxFuture<'_, Result<WorkerHandle>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(EngineCall::RegisterWorker {
                task_type: subscription.task_type.clone(),
            });
            state
                .handlers
                .insert(subscription.task_type.clone(), handler);
            Ok(WorkerHandle::detached(subscription.task_type))
        })
    }

    fn complete_job<'a>(
        &'a self,
        job_key: &'a EngineKey,
        variables: Variables,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(EngineCall::CompleteJob {
                job_key: job_key.clone(),
            });
            state.completed_jobs.push((job_key.clone(), variables));
            Ok(())
        })
    }

    fn search_human_tasks<'a>(
        &'a self,
        filter: &'a TaskFilter,
    ) -> BoxFuture<'a, Result<Vec<HumanTask>>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(EngineCall::SearchTasks { state: filter.state });
            self.check(&state, Operation::SearchTasks)?;
            Ok(state
                .tasks
                .iter()
                .filter(|t| t.state == filter.state)
                .filter(|t| match &filter.tenant_id {
                    Some(tenant) => t.tenant_id.as_deref() == Some(tenant.as_str()),
                    None => true,
                })
                .cloned()
                .collect())
        })
    }

    fn claim_human_task<'a>(
        &'a self,
        task_id: &'a TaskId,
        assignee: &'a str,
        allow_override: bool,
    ) -> BoxFuture<'a, Result<HumanTask>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(EngineCall::ClaimTask {
                task_id: task_id.clone(),
                assignee: assignee.to_string(),
            });
            if state.failing_claims.contains(task_id) {
                return Err(FlowkeeperError::ClaimConflict {
                    task_id: task_id.to_string(),
                    reason: "task is already assigned".to_string(),
                });
            }

            let task = state
                .tasks
                .iter_mut()
                .find(|t| &t.id == task_id)
                .ok_or_else(|| FlowkeeperError::Engine {
                    status: 404,
                    body: format!("task {task_id} not found"),
                })?;

            match (&task.assignee, task.state) {
                (_, TaskState::Completed | TaskState::Canceled | TaskState::Failed) => {
                    return Err(FlowkeeperError::ClaimConflict {
                        task_id: task_id.to_string(),
                        reason: format!("task is {}", task.state),
                    });
                }
                (Some(current), _) if current != assignee && !allow_override => {
                    return Err(FlowkeeperError::ClaimConflict {
                        task_id: task_id.to_string(),
                        reason: format!("task is assigned to {current}"),
                    });
                }
                _ => {}
            }

            task.assignee = Some(assignee.to_string());
            task.state = TaskState::Assigned;
            Ok(task.clone())
        })
    }

    fn complete_human_task<'a>(
        &'a self,
        task_id: &'a TaskId,
        variables: Variables,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(EngineCall::CompleteTask {
                task_id: task_id.clone(),
                variables,
            });
            if state.failing_completions.contains(task_id) {
                return Err(FlowkeeperError::Engine {
                    status: 500,
                    body: format!("completing task {task_id} failed"),
                });
            }

            let task = state
                .tasks
                .iter_mut()
                .find(|t| &t.id == task_id)
                .ok_or_else(|| FlowkeeperError::Engine {
                    status: 404,
                    body: format!("task {task_id} not found"),
                })?;
            if task.state != TaskState::Assigned {
                return Err(FlowkeeperError::Engine {
                    status: 409,
                    body: format!("task {task_id} is {} and cannot be completed", task.state),
                });
            }
            task.state = TaskState::Completed;
            Ok(())
        })
    }

    fn topology(&self) -> BoxFuture<'_, Result<Topology>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(EngineCall::Topology);
            self.check(&state, Operation::Topology)?;
            Ok(Topology {
                cluster_size: Some(1),
                broker_count: 1,
                gateway_version: Some("in-memory".to_string()),
            })
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(EngineCall::Close);
            state.handlers.clear();
            state.closed = true;
            Ok(())
        })
    }
}
