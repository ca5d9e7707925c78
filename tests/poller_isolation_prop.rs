// tests/poller_isolation_prop.rs

use std::sync::Arc;

use proptest::prelude::*;

use flowkeeper::client::{EngineKey, InMemoryEngine};
use flowkeeper::poller::{HumanTaskPoller, PollReport, TaskStage};
use flowkeeper::types::TaskState;
use flowkeeper_test_utils::builders::{ConfigFileBuilder, HumanTaskBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    None,
    Claim,
    Complete,
}

fn fault_strategy() -> impl Strategy<Value = Fault> {
    prop_oneof![
        3 => Just(Fault::None),
        1 => Just(Fault::Claim),
        1 => Just(Fault::Complete),
    ]
}

fn run_cycle(faults: &[Fault]) -> (InMemoryEngine, PollReport) {
    let engine = InMemoryEngine::new();
    for (i, fault) in faults.iter().enumerate() {
        let id = format!("task-{i}");
        engine.add_task(HumanTaskBuilder::new(&id).build());
        match fault {
            Fault::None => {}
            Fault::Claim => engine.fail_claim(id.as_str()),
            Fault::Complete => engine.fail_completion(id.as_str()),
        }
    }

    let cfg = ConfigFileBuilder::new().build();
    let poller = HumanTaskPoller::new(Arc::new(engine.clone()), cfg.poller_settings());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let report = rt.block_on(poller.poll_once()).expect("search succeeds");
    (engine, report)
}

proptest! {
    #[test]
    fn one_task_failing_never_affects_the_others(
        faults in proptest::collection::vec(fault_strategy(), 0..12)
    ) {
        let (engine, report) = run_cycle(&faults);

        prop_assert_eq!(report.fetched, faults.len());
        prop_assert_eq!(report.completed.len() + report.failures.len(), faults.len());

        for (i, fault) in faults.iter().enumerate() {
            let id = EngineKey::new(format!("task-{i}"));
            let task = engine.task(&id).expect("task exists");
            let failures: Vec<_> = report.failures.iter().filter(|f| f.task_id == id).collect();

            match fault {
                Fault::None => {
                    prop_assert!(report.completed.contains(&id));
                    prop_assert!(failures.is_empty());
                    prop_assert_eq!(task.state, TaskState::Completed);
                }
                Fault::Claim => {
                    prop_assert_eq!(failures.len(), 1);
                    prop_assert_eq!(failures[0].stage, TaskStage::Claim);
                    prop_assert_eq!(task.state, TaskState::Created);
                }
                Fault::Complete => {
                    prop_assert_eq!(failures.len(), 1);
                    prop_assert_eq!(failures[0].stage, TaskStage::Complete);
                    prop_assert_eq!(task.state, TaskState::Assigned);
                }
            }
        }
    }
}
