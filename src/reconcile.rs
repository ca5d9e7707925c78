// src/reconcile.rs

//! Converges the engine toward "one active instance of the target process".
//!
//! A pass looks the definition up, then the running instances, and creates
//! an instance only when none is active. Two passes in a row therefore
//! create at most one instance, as long as the engine's search reflects the
//! first creation by the time the second pass runs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::client::{
    CreateInstance, DefinitionFilter, EngineClient, InstanceFilter, ProcessInstance, Variables,
};
use crate::config::millis;
use crate::errors::{FlowkeeperError, Result};
use crate::types::InstanceState;

/// Which process the reconciler manages, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTarget {
    pub process_id: String,
    pub tenant_id: Option<String>,
    pub page_size: u32,
    pub create_timeout: Duration,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// No definition is deployed; nothing can be instantiated.
    DefinitionMissing,
    /// An active instance already existed.
    Existing(ProcessInstance),
    /// No active instance existed, so one was created.
    Created(ProcessInstance),
}

impl Reconciliation {
    pub fn instance(&self) -> Option<&ProcessInstance> {
        match self {
            Reconciliation::DefinitionMissing => None,
            Reconciliation::Existing(i) | Reconciliation::Created(i) => Some(i),
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, Reconciliation::Created(_))
    }
}

pub struct Reconciler {
    client: Arc<dyn EngineClient>,
    target: ProcessTarget,
}

impl Reconciler {
    pub fn new(client: Arc<dyn EngineClient>, target: ProcessTarget) -> Self {
        Self { client, target }
    }

    pub fn target(&self) -> &ProcessTarget {
        &self.target
    }

    /// Run one reconciliation pass.
    ///
    /// Lookup and creation errors are logged here and returned; the caller
    /// decides whether they are fatal.
    pub async fn reconcile(&self, desired: &Variables) -> Result<Reconciliation> {
        let process_id = self.target.process_id.as_str();

        info!(process_id, "searching for process definition");
        let definitions = self
            .client
            .search_process_definitions(
                &DefinitionFilter {
                    process_id: process_id.to_string(),
                },
                self.target.page_size,
            )
            .await
            .map_err(|err| {
                error!(process_id, error = %err, "failed to fetch process definitions");
                FlowkeeperError::lookup("process definitions", err)
            })?;

        let Some(definition) = definitions.first() else {
            warn!(process_id, "no process definition found; nothing to instantiate");
            return Ok(Reconciliation::DefinitionMissing);
        };
        info!(process_id, definition_key = %definition.key, "found process definition");

        let running = self
            .client
            .search_process_instances(
                &InstanceFilter {
                    process_id: process_id.to_string(),
                    state: InstanceState::Active,
                    tenant_id: self.target.tenant_id.clone(),
                },
                self.target.page_size,
            )
            .await
            .map_err(|err| {
                error!(process_id, error = %err, "failed to fetch running processes");
                FlowkeeperError::lookup("running processes", err)
            })?;

        // Engine order decides which one is reported; none is preferred.
        if let Some(instance) = running.into_iter().next() {
            info!(process_id, instance_key = %instance.key, "found running process");
            return Ok(Reconciliation::Existing(instance));
        }

        info!(process_id, "no running process found; creating new process instance");
        let created = self.create(desired).await?;
        info!(process_id, instance_key = %created.key, "process instance created");
        Ok(Reconciliation::Created(created))
    }

    async fn create(&self, desired: &Variables) -> Result<ProcessInstance> {
        let request = CreateInstance {
            process_id: self.target.process_id.clone(),
            variables: desired.clone(),
            tenant_id: self.target.tenant_id.clone(),
            timeout: self.target.create_timeout,
        };

        let outcome = tokio::time::timeout(
            self.target.create_timeout,
            self.client.create_process_instance_with_result(&request),
        )
        .await;

        match outcome {
            Ok(Ok(instance)) => Ok(instance),
            Ok(Err(err)) => {
                error!(
                    process_id = %request.process_id,
                    error = %err,
                    "failed to create process instance"
                );
                Err(FlowkeeperError::creation(&request.process_id, err))
            }
            Err(_elapsed) => {
                let timeout_ms = millis(self.target.create_timeout);
                error!(
                    process_id = %request.process_id,
                    timeout_ms,
                    "process instance creation timed out"
                );
                Err(FlowkeeperError::CreateTimeout {
                    process_id: request.process_id.clone(),
                    timeout_ms,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryEngine;
    use crate::client::mock::Operation;

    fn target(process_id: &str) -> ProcessTarget {
        ProcessTarget {
            process_id: process_id.to_string(),
            tenant_id: None,
            page_size: 100,
            create_timeout: Duration::from_secs(120),
        }
    }

    #[tokio::test]
    async fn missing_definition_stops_before_instance_search() {
        let engine = InMemoryEngine::new();
        let reconciler = Reconciler::new(Arc::new(engine.clone()), target("absent"));

        let outcome = reconciler.reconcile(&Variables::new()).await.unwrap();

        assert_eq!(outcome, Reconciliation::DefinitionMissing);
        assert_eq!(engine.calls().len(), 1);
        assert_eq!(engine.create_calls(), 0);
    }

    #[tokio::test]
    async fn instance_search_failure_is_a_lookup_error() {
        let engine = InMemoryEngine::new();
        engine.deploy("wf");
        engine.fail_operation(Operation::SearchInstances);
        let reconciler = Reconciler::new(Arc::new(engine.clone()), target("wf"));

        let err = reconciler.reconcile(&Variables::new()).await.unwrap_err();

        assert!(matches!(err, FlowkeeperError::Lookup { what: "running processes", .. }));
        assert_eq!(engine.create_calls(), 0);
    }

    #[tokio::test]
    async fn instances_of_other_tenants_do_not_count() {
        let engine = InMemoryEngine::new();
        engine.deploy("wf");
        engine.add_instance("wf", InstanceState::Active, Some("tenant-b"));
        let mut t = target("wf");
        t.tenant_id = Some("tenant-a".to_string());
        let reconciler = Reconciler::new(Arc::new(engine.clone()), t);

        let outcome = reconciler.reconcile(&Variables::new()).await.unwrap();

        assert!(outcome.created());
        assert_eq!(
            outcome.instance().and_then(|i| i.tenant_id.as_deref()),
            Some("tenant-a")
        );
    }
}
