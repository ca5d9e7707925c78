// src/client/mod.rs

//! Engine client abstraction.
//!
//! Every component talks to the workflow engine through [`EngineClient`]
//! instead of a concrete SDK. This keeps the reconciler, worker and poller
//! independent of the wire protocol and lets tests swap in the in-memory
//! engine from [`mock`].
//!
//! - [`model`] holds the records and filters shared by all implementations.
//! - [`http`] provides [`HttpEngineClient`], the production adapter.
//! - [`mock`] provides [`InMemoryEngine`], an in-process engine double with
//!   a call log and failure injection.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::Result;
use crate::worker::JobHandler;

pub mod http;
pub mod mock;
pub mod model;

pub use http::{EngineEndpoints, HttpEngineClient};
pub use mock::{EngineCall, InMemoryEngine};
pub use model::{
    AutomatedJob, CreateInstance, DefinitionFilter, EngineKey, HumanTask, InstanceFilter,
    JobSubscription, ProcessDefinition, ProcessInstance, TaskFilter, TaskId, Topology, Variables,
};

/// Boxed `Send` future returned by engine operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capabilities the orchestration core consumes from the workflow engine.
///
/// Implementations must be safe for concurrent use: the reconciler, the
/// worker subscription and the poller all hold the same
/// `Arc<dyn EngineClient>`.
pub trait EngineClient: Send + Sync {
    fn search_process_definitions<'a>(
        &'a self,
        filter: &'a DefinitionFilter,
        page_size: u32,
    ) -> BoxFuture<'a, Result<Vec<ProcessDefinition>>>;

    fn search_process_instances<'a>(
        &'a self,
        filter: &'a InstanceFilter,
        page_size: u32,
    ) -> BoxFuture<'a, Result<Vec<ProcessInstance>>>;

    /// Create an instance and wait for the engine to report its result.
    ///
    /// `request.timeout` is forwarded to the engine; callers enforce their
    /// own upper bound as well.
    fn create_process_instance_with_result<'a>(
        &'a self,
        request: &'a CreateInstance,
    ) -> BoxFuture<'a, Result<ProcessInstance>>;

    /// Start a standing push subscription for jobs of `subscription.task_type`.
    ///
    /// The handler is invoked once per delivered job until the client is
    /// closed or the returned handle is stopped.
    fn register_automated_worker(
        &self,
        subscription: JobSubscription,
        handler: Arc<dyn JobHandler>,
    ) -> BoxFuture<'_, Result<WorkerHandle>>;

    fn complete_job<'a>(
        &'a self,
        job_key: &'a EngineKey,
        variables: Variables,
    ) -> BoxFuture<'a, Result<()>>;

    fn search_human_tasks<'a>(&'a self, filter: &'a TaskFilter)
    -> BoxFuture<'a, Result<Vec<HumanTask>>>;

    fn claim_human_task<'a>(
        &'a self,
        task_id: &'a TaskId,
        assignee: &'a str,
        allow_override: bool,
    ) -> BoxFuture<'a, Result<HumanTask>>;

    fn complete_human_task<'a>(
        &'a self,
        task_id: &'a TaskId,
        variables: Variables,
    ) -> BoxFuture<'a, Result<()>>;

    fn topology(&self) -> BoxFuture<'_, Result<Topology>>;

    /// Release the connection and stop all worker subscriptions.
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

/// Handle to a running worker subscription.
///
/// Dropping the handle does not stop the subscription; call [`stop`] or
/// close the client.
///
/// [`stop`]: WorkerHandle::stop
#[derive(Debug)]
pub struct WorkerHandle {
    task_type: String,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Handle backed by a background polling task.
    pub fn spawned(task_type: impl Into<String>, task: tokio::task::JoinHandle<()>) -> Self {
        Self {
            task_type: task_type.into(),
            task: Some(task),
        }
    }

    /// Handle for subscriptions driven by the engine itself (no local task).
    pub fn detached(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            task: None,
        }
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
