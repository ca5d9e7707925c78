// src/worker.rs

//! Automated-task worker.
//!
//! Registration is a standing subscription owned by the engine client: the
//! client delivers each job of the registered type to a [`JobHandler`] via
//! [`deliver_job`], which reports completion back to the engine.
//!
//! A handler that fails leaves its job outstanding. This crate never
//! reports a failure outcome on the handler's behalf; the engine redelivers
//! the job once its lease times out. Because of redelivery, handlers should
//! produce the same output variables when run twice for the same job.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::client::{
    AutomatedJob, BoxFuture, EngineClient, JobSubscription, Variables, WorkerHandle,
};
use crate::errors::Result;

/// Business logic run for every delivered job.
pub trait JobHandler: Send + Sync {
    /// Handle one job and return the output variables to complete it with.
    fn handle<'a>(&'a self, job: &'a AutomatedJob) -> BoxFuture<'a, Result<Variables>>;
}

/// Handler that completes every job with the same output variables.
#[derive(Debug, Clone)]
pub struct FixedOutcomeHandler {
    outcome: Variables,
}

impl FixedOutcomeHandler {
    pub fn new(outcome: Variables) -> Self {
        Self { outcome }
    }
}

impl JobHandler for FixedOutcomeHandler {
    fn handle<'a>(&'a self, job: &'a AutomatedJob) -> BoxFuture<'a, Result<Variables>> {
        Box::pin(async move {
            info!(
                target: "flowkeeper::worker",
                job_key = %job.key,
                job_type = %job.job_type,
                "handling job of type {}",
                job.job_type
            );
            Ok(self.outcome.clone())
        })
    }
}

/// What happened to a single delivered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobDelivery {
    /// Handler succeeded and the engine accepted the completion.
    Completed,
    /// Handler failed; the job stays outstanding in the engine.
    HandlerFailed,
    /// Handler succeeded but reporting completion failed.
    CompletionFailed,
}

/// Run `handler` for `job` and report the outcome to the engine.
///
/// Shared by every client implementation so delivery semantics are the same
/// regardless of transport.
pub async fn deliver_job(
    client: &dyn EngineClient,
    handler: &dyn JobHandler,
    job: &AutomatedJob,
) -> JobDelivery {
    let output = match handler.handle(job).await {
        Ok(vars) => vars,
        Err(err) => {
            error!(
                target: "flowkeeper::worker",
                job_key = %job.key,
                job_type = %job.job_type,
                error = %err,
                "job handler failed; leaving job outstanding"
            );
            return JobDelivery::HandlerFailed;
        }
    };

    match client.complete_job(&job.key, output).await {
        Ok(()) => {
            debug!(target: "flowkeeper::worker", job_key = %job.key, "job completed");
            JobDelivery::Completed
        }
        Err(err) => {
            error!(
                target: "flowkeeper::worker",
                job_key = %job.key,
                job_type = %job.job_type,
                error = %err,
                "failed to report job completion"
            );
            JobDelivery::CompletionFailed
        }
    }
}

/// Register `handler` for `subscription.task_type` on `client`.
pub async fn start_worker(
    client: &dyn EngineClient,
    subscription: JobSubscription,
    handler: Arc<dyn JobHandler>,
) -> Result<WorkerHandle> {
    info!(
        target: "flowkeeper::worker",
        task_type = %subscription.task_type,
        worker = %subscription.worker_name,
        "creating worker"
    );
    client.register_automated_worker(subscription, handler).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::model::variables;
    use crate::client::{EngineKey, InMemoryEngine};
    use crate::errors::FlowkeeperError;
    use serde_json::json;

    struct FailingHandler;

    impl JobHandler for FailingHandler {
        fn handle<'a>(&'a self, _job: &'a AutomatedJob) -> BoxFuture<'a, Result<Variables>> {
            Box::pin(async { Err(FlowkeeperError::ConfigError("boom".to_string())) })
        }
    }

    fn job(key: &str) -> AutomatedJob {
        AutomatedJob {
            key: EngineKey::from(key),
            job_type: "service-task".to_string(),
            process_instance_key: None,
            retries: Some(3),
            variables: Variables::new(),
        }
    }

    #[tokio::test]
    async fn fixed_outcome_handler_completes_job_with_outcome() {
        let engine = InMemoryEngine::new();
        let handler =
            FixedOutcomeHandler::new(variables(json!({"serviceTaskOutcome": "We did it!"})));

        let delivery = deliver_job(&engine, &handler, &job("7")).await;

        assert_eq!(delivery, JobDelivery::Completed);
        let completed = engine.completed_jobs();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].0, EngineKey::from("7"));
        assert_eq!(completed[0].1["serviceTaskOutcome"], json!("We did it!"));
    }

    #[tokio::test]
    async fn handler_failure_leaves_job_outstanding() {
        let engine = InMemoryEngine::new();

        let delivery = deliver_job(&engine, &FailingHandler, &job("8")).await;

        assert_eq!(delivery, JobDelivery::HandlerFailed);
        assert!(engine.completed_jobs().is_empty());
    }
}
