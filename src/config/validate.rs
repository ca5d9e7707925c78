// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{
    ConfigFile, EngineConfig, HumanTaskConfig, ProcessConfig, RawConfigFile, WorkerConfig,
};
use crate::errors::{FlowkeeperError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FlowkeeperError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;

        let engine = EngineConfig {
            zeebe_address: non_empty(raw.engine.zeebe_address),
            zeebe_client_id: non_empty(raw.engine.zeebe_client_id),
            zeebe_client_secret: non_empty(raw.engine.zeebe_client_secret),
            camunda_operate_base_url: non_empty(raw.engine.camunda_operate_base_url),
            camunda_tasklist_base_url: non_empty(raw.engine.camunda_tasklist_base_url),
            request_timeout: duration_field("engine.request_timeout", &raw.engine.request_timeout)?,
        };

        let process = ProcessConfig {
            tenant_id: non_empty(Some(raw.process.tenant_id)),
            page_size: raw.process.page_size,
            create_timeout: duration_field("process.create_timeout", &raw.process.create_timeout)?,
            reconcile: raw.process.reconcile,
            variables: raw.process.variables,
            process_id: raw.process.process_id,
        };

        let worker = WorkerConfig {
            enabled: raw.worker.enabled,
            job_timeout: duration_field("worker.job_timeout", &raw.worker.job_timeout)?,
            task_type: raw.worker.task_type,
            worker_name: raw.worker.worker_name,
            max_jobs: raw.worker.max_jobs,
            outcome: raw.worker.outcome,
        };

        let human_tasks = HumanTaskConfig {
            enabled: raw.human_tasks.enabled,
            poll_interval: duration_field(
                "human_tasks.poll_interval",
                &raw.human_tasks.poll_interval,
            )?,
            assignee: raw.human_tasks.assignee,
            scope: raw.human_tasks.scope,
            tenant_filter: raw.human_tasks.tenant_filter,
            outcome: raw.human_tasks.outcome,
        };

        Ok(ConfigFile {
            engine,
            process,
            worker,
            human_tasks,
        })
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_process(cfg)?;
    validate_worker(cfg)?;
    validate_human_tasks(cfg)?;
    Ok(())
}

fn validate_process(cfg: &RawConfigFile) -> Result<()> {
    if cfg.process.process_id.trim().is_empty() {
        return Err(FlowkeeperError::ConfigError(
            "[process].process_id must not be empty".to_string(),
        ));
    }
    if cfg.process.page_size == 0 {
        return Err(FlowkeeperError::ConfigError(
            "[process].page_size must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_worker(cfg: &RawConfigFile) -> Result<()> {
    if !cfg.worker.enabled {
        return Ok(());
    }
    if cfg.worker.task_type.trim().is_empty() {
        return Err(FlowkeeperError::ConfigError(
            "[worker].task_type must not be empty when the worker is enabled".to_string(),
        ));
    }
    if cfg.worker.max_jobs == 0 {
        return Err(FlowkeeperError::ConfigError(
            "[worker].max_jobs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_human_tasks(cfg: &RawConfigFile) -> Result<()> {
    if !cfg.human_tasks.enabled {
        return Ok(());
    }
    if cfg.human_tasks.assignee.trim().is_empty() {
        return Err(FlowkeeperError::ConfigError(
            "[human_tasks].assignee must not be empty when the poller is enabled".to_string(),
        ));
    }
    let interval = duration_field("human_tasks.poll_interval", &cfg.human_tasks.poll_interval)?;
    if interval.is_zero() {
        return Err(FlowkeeperError::ConfigError(
            "[human_tasks].poll_interval must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn duration_field(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| FlowkeeperError::ConfigError(format!("invalid {field} '{value}': {e}")))
}

/// Parse a duration such as `"500ms"`, `"3s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| "duration too large".to_string())
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("3000ms"), Ok(Duration::from_millis(3000)));
        assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_bad_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5d").is_err());
        assert_eq!(
            parse_duration("400000000000000000m"),
            Err("duration too large".to_string())
        );
        assert!(parse_duration("18446744073709551615h").is_err());
    }

    #[test]
    fn oversized_poll_interval_is_a_config_error() {
        let mut raw = RawConfigFile::default();
        raw.human_tasks.poll_interval = "400000000000000000m".to_string();
        match ConfigFile::try_from(raw) {
            Err(FlowkeeperError::ConfigError(msg)) => {
                assert!(msg.contains("poll_interval"));
                assert!(msg.contains("too large"));
            }
            other => panic!("Expected ConfigError, got: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn defaults_validate() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(cfg.process.process_id, "c8-sdk-demo");
        assert_eq!(cfg.process.tenant_id.as_deref(), Some("<default>"));
        assert_eq!(cfg.process.create_timeout, Duration::from_secs(120));
        assert_eq!(cfg.human_tasks.poll_interval, Duration::from_millis(3000));
        assert_eq!(cfg.human_tasks.assignee, "demo-app-assignee");
        assert_eq!(cfg.worker.task_type, "service-task");
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.human_tasks.poll_interval = "0ms".to_string();
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("poll_interval"));
    }

    #[test]
    fn disabled_poller_skips_assignee_check() {
        let mut raw = RawConfigFile::default();
        raw.human_tasks.enabled = false;
        raw.human_tasks.assignee = String::new();
        assert!(ConfigFile::try_from(raw).is_ok());
    }

    #[test]
    fn empty_tenant_disables_tenant_filter() {
        let mut raw = RawConfigFile::default();
        raw.process.tenant_id = "  ".to_string();
        let cfg = ConfigFile::try_from(raw).unwrap();
        assert_eq!(cfg.process.tenant_id, None);
    }
}
