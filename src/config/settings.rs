// src/config/settings.rs

//! Turns a validated [`ConfigFile`] into the settings each component is
//! constructed with.
//!
//! Engine connection settings are the only required values. Each can be
//! written in `[engine]` or supplied through the environment variable of the
//! same (upper-cased) name; the environment wins. All missing names are
//! reported together.

use std::sync::Arc;

use crate::client::{EngineEndpoints, JobSubscription};
use crate::config::model::{ConfigFile, EngineConfig};
use crate::errors::{FlowkeeperError, Result};
use crate::poller::PollerSettings;
use crate::reconcile::ProcessTarget;
use crate::worker::FixedOutcomeHandler;

/// Names of the required connection settings, in reporting order.
pub const REQUIRED_SETTINGS: [&str; 5] = [
    "ZEEBE_ADDRESS",
    "ZEEBE_CLIENT_ID",
    "ZEEBE_CLIENT_SECRET",
    "CAMUNDA_OPERATE_BASE_URL",
    "CAMUNDA_TASKLIST_BASE_URL",
];

/// Resolve engine endpoints from the file values and an environment lookup.
///
/// `env` is usually `|k| std::env::var(k).ok()`; tests pass a map lookup.
pub fn resolve_endpoints<F>(engine: &EngineConfig, env: F) -> Result<EngineEndpoints>
where
    F: Fn(&str) -> Option<String>,
{
    let file_values = [
        &engine.zeebe_address,
        &engine.zeebe_client_id,
        &engine.zeebe_client_secret,
        &engine.camunda_operate_base_url,
        &engine.camunda_tasklist_base_url,
    ];

    let mut resolved: Vec<Option<String>> = Vec::with_capacity(REQUIRED_SETTINGS.len());
    let mut missing = Vec::new();

    for (name, from_file) in REQUIRED_SETTINGS.iter().zip(file_values) {
        let value = env(name)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| from_file.clone());
        if value.is_none() {
            missing.push(name.to_string());
        }
        resolved.push(value);
    }

    if !missing.is_empty() {
        return Err(FlowkeeperError::MissingSettings(missing));
    }

    let mut values = resolved.into_iter().flatten();
    let mut next = || values.next().unwrap_or_default();
    Ok(EngineEndpoints {
        zeebe_address: next(),
        client_id: next(),
        client_secret: next(),
        operate_base_url: next(),
        tasklist_base_url: next(),
        request_timeout: engine.request_timeout,
    })
}

impl ConfigFile {
    pub fn process_target(&self) -> ProcessTarget {
        ProcessTarget {
            process_id: self.process.process_id.clone(),
            tenant_id: self.process.tenant_id.clone(),
            page_size: self.process.page_size,
            create_timeout: self.process.create_timeout,
        }
    }

    pub fn poller_settings(&self) -> PollerSettings {
        let tenant_id = if self.human_tasks.tenant_filter {
            self.process.tenant_id.clone()
        } else {
            None
        };

        PollerSettings {
            assignee: self.human_tasks.assignee.clone(),
            outcome: self.human_tasks.outcome.clone(),
            poll_interval: self.human_tasks.poll_interval,
            scope: self.human_tasks.scope,
            process_id: self.process.process_id.clone(),
            tenant_id,
            page_size: self.process.page_size,
        }
    }

    pub fn job_subscription(&self) -> JobSubscription {
        JobSubscription {
            task_type: self.worker.task_type.clone(),
            worker_name: self.worker.worker_name.clone(),
            max_jobs: self.worker.max_jobs,
            job_timeout: self.worker.job_timeout,
        }
    }

    pub fn job_handler(&self) -> Arc<FixedOutcomeHandler> {
        Arc::new(FixedOutcomeHandler::new(self.worker.outcome.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfigFile;
    use std::collections::HashMap;

    fn defaults() -> ConfigFile {
        ConfigFile::try_from(RawConfigFile::default()).unwrap()
    }

    #[test]
    fn all_missing_settings_are_enumerated() {
        let cfg = defaults();
        let env: HashMap<&str, &str> = HashMap::from([("ZEEBE_CLIENT_ID", "id")]);

        let err = resolve_endpoints(&cfg.engine, |k| env.get(k).map(|v| v.to_string()))
            .unwrap_err();

        match err {
            FlowkeeperError::MissingSettings(names) => assert_eq!(
                names,
                vec![
                    "ZEEBE_ADDRESS",
                    "ZEEBE_CLIENT_SECRET",
                    "CAMUNDA_OPERATE_BASE_URL",
                    "CAMUNDA_TASKLIST_BASE_URL",
                ]
            ),
            other => panic!("expected MissingSettings, got {other:?}"),
        }
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut cfg = defaults();
        cfg.engine.zeebe_address = Some("http://file:8080".to_string());
        cfg.engine.zeebe_client_id = Some("file-id".to_string());
        cfg.engine.zeebe_client_secret = Some("file-secret".to_string());
        cfg.engine.camunda_operate_base_url = Some("http://file:8081".to_string());
        cfg.engine.camunda_tasklist_base_url = Some("http://file:8082".to_string());

        let env: HashMap<&str, &str> = HashMap::from([("ZEEBE_ADDRESS", "http://env:8080")]);
        let endpoints =
            resolve_endpoints(&cfg.engine, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(endpoints.zeebe_address, "http://env:8080");
        assert_eq!(endpoints.client_id, "file-id");
        assert_eq!(endpoints.client_secret, "file-secret");
        assert_eq!(endpoints.operate_base_url, "http://file:8081");
        assert_eq!(endpoints.tasklist_base_url, "http://file:8082");
    }

    #[test]
    fn tenant_filter_controls_poller_tenant() {
        let mut cfg = defaults();
        assert_eq!(cfg.poller_settings().tenant_id, None);

        cfg.human_tasks.tenant_filter = true;
        assert_eq!(cfg.poller_settings().tenant_id.as_deref(), Some("<default>"));
    }
}
