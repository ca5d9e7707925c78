#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use flowkeeper::client::model::variables;
use flowkeeper::client::{AutomatedJob, BoxFuture, EngineKey, Variables};
use flowkeeper::errors::{FlowkeeperError, Result};
use flowkeeper::worker::JobHandler;

/// Job handler that records every job it sees.
///
/// Returns a fixed outcome, or an error for keys registered with
/// [`RecordingHandler::fail_on`].
#[derive(Clone, Default)]
pub struct RecordingHandler {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    seen: Vec<AutomatedJob>,
    failing: HashSet<EngineKey>,
    outcome: Variables,
}

impl RecordingHandler {
    pub fn new(outcome: Value) -> Self {
        let handler = Self::default();
        handler.lock().outcome = variables(outcome);
        handler
    }

    pub fn fail_on(&self, key: &str) {
        self.lock().failing.insert(EngineKey::new(key));
    }

    pub fn seen(&self) -> Vec<AutomatedJob> {
        self.lock().seen.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("recording handler lock poisoned")
    }
}

impl JobHandler for RecordingHandler {
    fn handle<'a>(&'a self, job: &'a AutomatedJob) -> BoxFuture<'a, Result<Variables>> {
        Box::pin(async move {
            let mut inner = self.lock();
            inner.seen.push(job.clone());
            if inner.failing.contains(&job.key) {
                return Err(FlowkeeperError::Other(anyhow::anyhow!(
                    "handler refused job {}",
                    job.key
                )));
            }
            Ok(inner.outcome.clone())
        })
    }
}
