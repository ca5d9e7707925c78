// src/lib.rs

pub mod cli;
pub mod client;
pub mod config;
pub mod errors;
pub mod logging;
pub mod poller;
pub mod reconcile;
pub mod types;
pub mod worker;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::client::{EngineClient, HttpEngineClient, WorkerHandle};
use crate::config::{ConfigFile, REQUIRED_SETTINGS, load_or_default, resolve_endpoints};
use crate::poller::HumanTaskPoller;
use crate::reconcile::Reconciler;
use crate::worker::start_worker;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and environment overlay
/// - the HTTP engine client
/// - Ctrl-C handling
///
/// and then hands over to [`run_with_client`].
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref())?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let endpoints = resolve_endpoints(&cfg.engine, |key| std::env::var(key).ok())?;
    let client: Arc<dyn EngineClient> = Arc::new(HttpEngineClient::new(endpoints)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Ctrl-C → graceful shutdown.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    run_with_client(client, &cfg, args.once, shutdown_rx).await
}

/// Run the orchestration against an already constructed client.
///
/// The worker subscription and the poller loop start before reconciliation,
/// so an instance created with an awaited result can have its jobs and
/// human tasks serviced while the create call is outstanding.
///
/// Normal mode then waits until `shutdown` flips to `true` (or its sender is
/// dropped). With `once`, the run ends as soon as reconciliation returns,
/// after one final poll cycle. A shutdown request interrupts a pending
/// reconciliation in both modes.
///
/// Reconciliation and poll errors are logged and never end the run; the
/// client is closed exactly once on the way out.
pub async fn run_with_client(
    client: Arc<dyn EngineClient>,
    cfg: &ConfigFile,
    once: bool,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    check_topology(client.as_ref()).await;

    let mut worker = if cfg.worker.enabled {
        Some(start_worker(client.as_ref(), cfg.job_subscription(), cfg.job_handler()).await?)
    } else {
        None
    };

    let (stop_poller, poller_stopped) = watch::channel(false);
    let poller_task = if cfg.human_tasks.enabled {
        let poller = HumanTaskPoller::new(Arc::clone(&client), cfg.poller_settings());
        Some(tokio::spawn(async move { poller.run(poller_stopped).await }))
    } else {
        None
    };

    let interrupted = tokio::select! {
        _ = reconcile(&client, cfg) => false,
        _ = shutdown_requested(shutdown.clone()) => {
            info!("shutdown requested during reconciliation");
            true
        }
    };

    if !once && !interrupted {
        wait_for_shutdown(shutdown).await;
    }

    let _ = stop_poller.send(true);
    if let Some(task) = poller_task {
        if let Err(err) = task.await {
            warn!(error = %err, "human task poller ended abnormally");
        }
        if once && !interrupted {
            let poller = HumanTaskPoller::new(Arc::clone(&client), cfg.poller_settings());
            if let Err(err) = poller.poll_once().await {
                error!(error = %err, "human task cycle failed");
            }
        }
    }
    if let Some(handle) = worker.as_mut() {
        stop_worker(handle);
    }

    client.close().await?;
    info!("engine client closed");
    Ok(())
}

async fn check_topology(client: &dyn EngineClient) {
    match client.topology().await {
        Ok(topology) => info!(
            brokers = topology.broker_count,
            cluster_size = ?topology.cluster_size,
            gateway_version = ?topology.gateway_version,
            "connected to engine"
        ),
        Err(err) => warn!(error = %err, "topology check failed"),
    }
}

async fn reconcile(client: &Arc<dyn EngineClient>, cfg: &ConfigFile) {
    if !cfg.process.reconcile {
        debug!("reconciliation disabled");
        return;
    }

    let reconciler = Reconciler::new(Arc::clone(client), cfg.process_target());
    // The reconciler already logged the cause.
    if let Err(err) = reconciler.reconcile(&cfg.process.variables).await {
        debug!(error = %err, "reconciliation did not complete");
    }
}

fn stop_worker(handle: &mut WorkerHandle) {
    handle.stop();
    info!(task_type = handle.task_type(), "worker stopped");
}

/// Resolves once `true` is sent. A dropped sender never resolves it.
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

/// Print the effective plan without contacting the engine.
fn print_dry_run(cfg: &ConfigFile) {
    println!("flowkeeper dry-run");
    println!();

    println!("engine:");
    let file_values = [
        &cfg.engine.zeebe_address,
        &cfg.engine.zeebe_client_id,
        &cfg.engine.zeebe_client_secret,
        &cfg.engine.camunda_operate_base_url,
        &cfg.engine.camunda_tasklist_base_url,
    ];
    for (name, from_file) in REQUIRED_SETTINGS.iter().zip(file_values) {
        let source = if std::env::var(name).is_ok_and(|v| !v.trim().is_empty()) {
            "environment"
        } else if from_file.is_some() {
            "config file"
        } else {
            "MISSING"
        };
        println!("  {name}: {source}");
    }
    println!("  request_timeout: {:?}", cfg.engine.request_timeout);
    println!();

    println!("process:");
    println!("  process_id: {}", cfg.process.process_id);
    match cfg.process.tenant_id {
        Some(ref tenant) => println!("  tenant_id: {tenant}"),
        None => println!("  tenant_id: (any)"),
    }
    println!("  reconcile: {}", cfg.process.reconcile);
    println!("  create_timeout: {:?}", cfg.process.create_timeout);
    println!("  variables: {}", serde_json::Value::Object(cfg.process.variables.clone()));
    println!();

    println!("worker:");
    println!("  enabled: {}", cfg.worker.enabled);
    if cfg.worker.enabled {
        println!("  task_type: {}", cfg.worker.task_type);
        println!("  worker_name: {}", cfg.worker.worker_name);
        println!("  max_jobs: {}", cfg.worker.max_jobs);
        println!("  job_timeout: {:?}", cfg.worker.job_timeout);
        println!("  outcome: {}", serde_json::Value::Object(cfg.worker.outcome.clone()));
    }
    println!();

    println!("human_tasks:");
    println!("  enabled: {}", cfg.human_tasks.enabled);
    if cfg.human_tasks.enabled {
        println!("  assignee: {}", cfg.human_tasks.assignee);
        println!("  poll_interval: {:?}", cfg.human_tasks.poll_interval);
        println!("  scope: {:?}", cfg.human_tasks.scope);
        println!("  tenant_filter: {}", cfg.human_tasks.tenant_filter);
        println!(
            "  outcome: {}",
            serde_json::Value::Object(cfg.human_tasks.outcome.clone())
        );
    }

    debug!("dry-run complete (engine not contacted)");
}
