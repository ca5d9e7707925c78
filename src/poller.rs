// src/poller.rs

//! Human-task poller.
//!
//! Each cycle searches for CREATED tasks, then claims and completes them one
//! by one under a fixed assignee. A failure on one task is logged with its
//! id and recorded in the [`PollReport`]; the rest of the batch carries on.
//!
//! [`HumanTaskPoller::run`] is strictly sequential: the next cycle is
//! scheduled `poll_interval` after the previous one has fully finished, so
//! cycles never overlap however slow the engine is.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::{
    DefinitionFilter, EngineClient, EngineKey, HumanTask, TaskFilter, TaskId, Variables,
};
use crate::config::millis;
use crate::errors::{FlowkeeperError, Result};
use crate::types::{TaskScope, TaskState};

/// Static configuration of a poller.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerSettings {
    pub assignee: String,
    pub outcome: Variables,
    pub poll_interval: Duration,
    pub scope: TaskScope,
    /// Process id used when `scope` is [`TaskScope::Process`].
    pub process_id: String,
    /// Restrict the task search to this tenant.
    pub tenant_id: Option<String>,
    pub page_size: u32,
}

/// Step of the per-task lifecycle that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStage {
    Claim,
    Complete,
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStage::Claim => f.write_str("claim"),
            TaskStage::Complete => f.write_str("complete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub stage: TaskStage,
    pub error: String,
}

/// What one poll cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Tasks returned by the search.
    pub fetched: usize,
    /// Tasks left alone because they are outside the configured scope.
    pub skipped: usize,
    pub completed: Vec<TaskId>,
    pub failures: Vec<TaskFailure>,
}

impl PollReport {
    pub fn is_empty(&self) -> bool {
        self.fetched == 0
    }
}

pub struct HumanTaskPoller {
    client: Arc<dyn EngineClient>,
    settings: PollerSettings,
}

impl HumanTaskPoller {
    pub fn new(client: Arc<dyn EngineClient>, settings: PollerSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &PollerSettings {
        &self.settings
    }

    /// Run poll cycles until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            target: "flowkeeper::poller",
            assignee = %self.settings.assignee,
            interval_ms = millis(self.settings.poll_interval),
            "starting human task poller"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            // Errors are already logged inside the cycle; the next cycle is
            // the only retry.
            let _ = self.poll_once().await;

            let sender_gone = tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => false,
                changed = shutdown.changed() => changed.is_err(),
            };
            if sender_gone {
                break;
            }
        }

        info!(target: "flowkeeper::poller", "human task poller stopped");
    }

    /// Run one search/claim/complete cycle.
    ///
    /// Only a failed search is returned as an error; per-task failures are
    /// part of the report.
    pub async fn poll_once(&self) -> Result<PollReport> {
        let filter = TaskFilter {
            state: TaskState::Created,
            tenant_id: self.settings.tenant_id.clone(),
        };

        let tasks = self
            .client
            .search_human_tasks(&filter)
            .await
            .map_err(|err| {
                warn!(target: "flowkeeper::poller", error = %err, "error searching for tasks");
                FlowkeeperError::lookup("human tasks", err)
            })?;

        let mut report = PollReport {
            fetched: tasks.len(),
            ..PollReport::default()
        };

        if tasks.is_empty() {
            info!(target: "flowkeeper::poller", "no human tasks found");
            return Ok(report);
        }
        info!(target: "flowkeeper::poller", count = tasks.len(), "fetched human tasks");

        let tasks = self.in_scope(tasks, &mut report).await?;

        for task in tasks {
            match self.service(&task).await {
                Ok(()) => report.completed.push(task.id),
                Err(failure) => report.failures.push(failure),
            }
        }

        debug!(
            target: "flowkeeper::poller",
            completed = report.completed.len(),
            failed = report.failures.len(),
            skipped = report.skipped,
            "poll cycle finished"
        );
        Ok(report)
    }

    /// Drop tasks outside the configured scope.
    async fn in_scope(
        &self,
        tasks: Vec<HumanTask>,
        report: &mut PollReport,
    ) -> Result<Vec<HumanTask>> {
        if self.settings.scope == TaskScope::All {
            return Ok(tasks);
        }

        let definitions = self
            .client
            .search_process_definitions(
                &DefinitionFilter {
                    process_id: self.settings.process_id.clone(),
                },
                self.settings.page_size,
            )
            .await
            .map_err(|err| {
                warn!(
                    target: "flowkeeper::poller",
                    error = %err,
                    "error resolving process definitions for task scope"
                );
                FlowkeeperError::lookup("process definitions", err)
            })?;
        let keys: HashSet<EngineKey> = definitions.into_iter().map(|d| d.key).collect();

        let (keep, skip): (Vec<_>, Vec<_>) = tasks.into_iter().partition(|t| {
            t.process_definition_key
                .as_ref()
                .is_some_and(|k| keys.contains(k))
        });
        report.skipped = skip.len();
        for task in &skip {
            debug!(
                target: "flowkeeper::poller",
                task_id = %task.id,
                "task belongs to another process; skipping"
            );
        }
        Ok(keep)
    }

    /// Claim then complete a single task.
    async fn service(&self, task: &HumanTask) -> std::result::Result<(), TaskFailure> {
        let process = task
            .process_instance_key
            .as_ref()
            .map(EngineKey::to_string)
            .unwrap_or_default();

        info!(
            target: "flowkeeper::poller",
            task_id = %task.id,
            process_instance_key = %process,
            "claiming task {} from process {}",
            task.id,
            process
        );
        let claimed = self
            .client
            .claim_human_task(&task.id, &self.settings.assignee, true)
            .await
            .map_err(|err| self.failure(task, TaskStage::Claim, err))?;

        info!(
            target: "flowkeeper::poller",
            task_id = %claimed.id,
            "servicing human task {}",
            claimed.id
        );
        self.client
            .complete_human_task(&claimed.id, self.settings.outcome.clone())
            .await
            .map_err(|err| self.failure(task, TaskStage::Complete, err))
    }

    fn failure(&self, task: &HumanTask, stage: TaskStage, err: FlowkeeperError) -> TaskFailure {
        warn!(
            target: "flowkeeper::poller",
            task_id = %task.id,
            stage = %stage,
            error = %err,
            "error processing task {}",
            task.id
        );
        TaskFailure {
            task_id: task.id.clone(),
            stage,
            error: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryEngine;
    use crate::client::mock::{EngineCall, Operation};

    fn settings() -> PollerSettings {
        PollerSettings {
            assignee: "demo-app-assignee".to_string(),
            outcome: Variables::new(),
            poll_interval: Duration::from_millis(3000),
            scope: TaskScope::All,
            process_id: "wf".to_string(),
            tenant_id: None,
            page_size: 100,
        }
    }

    fn task(id: &str, definition: Option<&EngineKey>) -> HumanTask {
        HumanTask {
            id: TaskId::from(id),
            name: None,
            process_instance_key: None,
            process_definition_key: definition.cloned(),
            state: TaskState::Created,
            assignee: None,
            tenant_id: None,
        }
    }

    #[tokio::test]
    async fn completion_failure_is_reported_with_stage() {
        let engine = InMemoryEngine::new();
        engine.add_task(task("a", None));
        engine.add_task(task("b", None));
        engine.fail_completion("a");
        let poller = HumanTaskPoller::new(Arc::new(engine.clone()), settings());

        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.completed, vec![TaskId::from("b")]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage, TaskStage::Complete);
        assert_eq!(report.failures[0].task_id, TaskId::from("a"));
    }

    #[tokio::test]
    async fn search_failure_is_returned_without_claims() {
        let engine = InMemoryEngine::new();
        engine.add_task(task("a", None));
        engine.fail_operation(Operation::SearchTasks);
        let poller = HumanTaskPoller::new(Arc::new(engine.clone()), settings());

        let err = poller.poll_once().await.unwrap_err();

        assert!(matches!(err, FlowkeeperError::Lookup { what: "human tasks", .. }));
        assert!(
            !engine
                .calls()
                .iter()
                .any(|c| matches!(c, EngineCall::ClaimTask { .. }))
        );
    }

    #[tokio::test]
    async fn process_scope_skips_foreign_tasks() {
        let engine = InMemoryEngine::new();
        let ours = engine.deploy("wf");
        let theirs = engine.deploy("other");
        engine.add_task(task("mine", Some(&ours)));
        engine.add_task(task("foreign", Some(&theirs)));
        engine.add_task(task("orphan", None));

        let mut s = settings();
        s.scope = TaskScope::Process;
        let poller = HumanTaskPoller::new(Arc::new(engine.clone()), s);

        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.fetched, 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.completed, vec![TaskId::from("mine")]);
        assert_eq!(
            engine.task(&TaskId::from("foreign")).map(|t| t.state),
            Some(TaskState::Created)
        );
    }
}
