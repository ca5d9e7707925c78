// tests/job_worker.rs

use std::error::Error;
use std::sync::Arc;

use serde_json::json;

use flowkeeper::client::{EngineCall, EngineKey, InMemoryEngine};
use flowkeeper::worker::{JobDelivery, start_worker};
use flowkeeper_test_utils::builders::{ConfigFileBuilder, JobBuilder};
use flowkeeper_test_utils::recording_handler::RecordingHandler;
use flowkeeper_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn registered_worker_completes_delivered_jobs() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = InMemoryEngine::new();
        let cfg = ConfigFileBuilder::new().build();
        let handle = start_worker(&engine, cfg.job_subscription(), cfg.job_handler()).await?;

        assert_eq!(handle.task_type(), "service-task");
        assert!(engine.has_worker("service-task"));

        let delivery = engine
            .deliver(JobBuilder::new("1", "service-task").build())
            .await;
        assert_eq!(delivery, Some(JobDelivery::Completed));

        let completed = engine.completed_jobs();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].0, EngineKey::new("1"));
        assert_eq!(
            completed[0].1.get("serviceTaskOutcome"),
            Some(&json!("We did it!"))
        );
        Ok(())
    })
    .await
}

#[tokio::test]
async fn jobs_of_other_types_are_not_delivered() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = InMemoryEngine::new();
        let handler = RecordingHandler::new(json!({ "ok": true }));
        let cfg = ConfigFileBuilder::new().build();
        start_worker(&engine, cfg.job_subscription(), Arc::new(handler.clone())).await?;

        let delivery = engine.deliver(JobBuilder::new("7", "invoice").build()).await;

        assert_eq!(delivery, None);
        assert!(handler.seen().is_empty());
        assert!(engine.completed_jobs().is_empty());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn each_delivery_invokes_the_handler_once() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = InMemoryEngine::new();
        let handler = RecordingHandler::new(json!({ "ok": true }));
        let cfg = ConfigFileBuilder::new().with_task_type("pay").build();
        start_worker(&engine, cfg.job_subscription(), Arc::new(handler.clone())).await?;

        for key in ["1", "2", "3"] {
            let job = JobBuilder::new(key, "pay")
                .variables(json!({ "amount": 10 }))
                .build();
            assert_eq!(engine.deliver(job).await, Some(JobDelivery::Completed));
        }

        let seen: Vec<String> = handler.seen().iter().map(|j| j.key.to_string()).collect();
        assert_eq!(seen, vec!["1", "2", "3"]);
        assert_eq!(handler.seen()[0].variables.get("amount"), Some(&json!(10)));
        assert_eq!(engine.completed_jobs().len(), 3);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn failing_job_is_left_outstanding_without_blocking_others() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = InMemoryEngine::new();
        let handler = RecordingHandler::new(json!({ "ok": true }));
        handler.fail_on("2");
        let cfg = ConfigFileBuilder::new().build();
        start_worker(&engine, cfg.job_subscription(), Arc::new(handler.clone())).await?;

        let first = engine.deliver(JobBuilder::new("1", "service-task").build()).await;
        let second = engine.deliver(JobBuilder::new("2", "service-task").build()).await;
        let third = engine.deliver(JobBuilder::new("3", "service-task").build()).await;

        assert_eq!(first, Some(JobDelivery::Completed));
        assert_eq!(second, Some(JobDelivery::HandlerFailed));
        assert_eq!(third, Some(JobDelivery::Completed));

        let completed: Vec<EngineKey> =
            engine.completed_jobs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(completed, vec![EngineKey::new("1"), EngineKey::new("3")]);
        assert!(!engine.calls().contains(&EngineCall::CompleteJob {
            job_key: EngineKey::new("2")
        }));
        Ok(())
    })
    .await
}
