//! Lifecycle Tests
//!
//! Start, suspend, resume and stop, and the one-partition-per-run invariant.

use crate::common::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

#[test]
fn program_lifecycle_scenario() {
    let t = TestStore::new();
    let p = program("counter");
    let r1 = RunId::new("r1");

    t.start(&p, &r1, 100);
    assert_eq!(t.runs.get_run(&p, &r1).unwrap().unwrap().status, RunStatus::Running);

    t.runs.record_program_suspend(&p, &r1).unwrap();
    assert!(!t.ids(Some(&p), RunStatus::Running.into()).contains(&r1));
    assert_eq!(t.ids(Some(&p), RunStatus::Suspended.into()), vec![r1.clone()]);
    assert_eq!(t.partitions_of(&p, &r1), vec![Partition::Suspended]);

    t.runs.record_program_resumed(&p, &r1).unwrap();
    t.stop(&p, &r1, 200, RunStatus::Completed);

    let record = t.runs.get_run(&p, &r1).unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.start_ts, 100);
    assert_eq!(record.stop_ts, Some(200));
    assert!(!t.ids(Some(&p), RunStatus::Running.into()).contains(&r1));
}

#[test]
fn every_transition_leaves_one_partition() {
    let t = TestStore::new();
    let p = program("counter");
    let run = RunId::generate();

    t.start(&p, &run, 10);
    assert_eq!(t.partitions_of(&p, &run), vec![Partition::Started]);
    for _ in 0..3 {
        t.runs.record_program_suspend(&p, &run).unwrap();
        assert_eq!(t.partitions_of(&p, &run), vec![Partition::Suspended]);
        t.runs.record_program_resumed(&p, &run).unwrap();
        assert_eq!(t.partitions_of(&p, &run), vec![Partition::Started]);
    }
    t.stop(&p, &run, 20, RunStatus::Killed);
    assert_eq!(t.partitions_of(&p, &run), vec![Partition::Completed]);
}

#[test]
fn suspend_resume_preserves_record() {
    let t = TestStore::new();
    let p = program("counter");
    let run = RunId::from_time(1_700_000_000);
    let mut args = BTreeMap::new();
    args.insert("logical.start.time".to_string(), "1700000000000".to_string());
    t.runs
        .record_program_start(&p, &run, 1_700_000_000, Some("app_1"), args)
        .unwrap();
    let started = t.runs.get_run(&p, &run).unwrap().unwrap();

    t.runs.record_program_suspend(&p, &run).unwrap();
    let suspended = t.runs.get_run(&p, &run).unwrap().unwrap();
    assert_eq!(suspended.clone().with_status(RunStatus::Running), started);

    t.runs.record_program_resumed(&p, &run).unwrap();
    assert_eq!(t.runs.get_run(&p, &run).unwrap().unwrap(), started);
}

#[test]
fn runs_of_different_programs_are_isolated() {
    let t = TestStore::new();
    let (a, b) = (program("a"), program("b"));
    let run = RunId::new("shared-id");
    t.start(&a, &run, 1);
    assert!(t.runs.get_run(&b, &run).unwrap().is_none());
    assert!(t.runs.record_program_suspend(&b, &run).is_err());
    assert_eq!(t.partitions_of(&a, &run), vec![Partition::Started]);
}

#[test]
fn caller_transaction_commits_atomically() {
    let t = TestStore::new();
    let p = program("chain");
    let (first, second) = (RunId::new("first"), RunId::new("second"));
    t.start(&p, &first, 1);

    t.db.transaction(|txn| {
        txn.record_program_stop(&p, &first, 5, RunStatus::Completed)?;
        txn.record_program_start(&p, &second, 5, None, BTreeMap::new())
    })
    .unwrap();
    assert_eq!(t.partitions_of(&p, &first), vec![Partition::Completed]);
    assert_eq!(t.partitions_of(&p, &second), vec![Partition::Started]);

    // A failure later in the transaction discards the earlier transition
    let result = t.db.transaction(|txn| {
        txn.record_program_suspend(&p, &second)?;
        txn.record_program_stop(&p, &first, 6, RunStatus::Failed)
    });
    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert_eq!(t.partitions_of(&p, &second), vec![Partition::Started]);
}

fn program_type() -> impl Strategy<Value = ProgramType> {
    prop::sample::select(ProgramType::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn stop_requires_start(
        ns in "[a-z]{1,8}",
        app in "[a-z]{1,8}",
        kind in program_type(),
        name in "[a-z]{1,8}",
        run in "[a-z0-9-]{1,16}",
        stop_ts in 0i64..i64::MAX,
    ) {
        let t = TestStore::new();
        let p = ProgramId::new(ns, app, kind, name);
        let err = t
            .runs
            .record_program_stop(&p, &RunId::new(run), stop_ts, RunStatus::Completed)
            .unwrap_err();
        prop_assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn transitions_keep_exactly_one_row(ops in prop::collection::vec(0u8..3, 1..12)) {
        let t = TestStore::new();
        let p = program("prop");
        let run = RunId::new("r");
        t.start(&p, &run, 1);
        let mut expected = Partition::Started;

        for op in ops {
            let outcome = match op {
                0 => t.runs.record_program_suspend(&p, &run),
                1 => t.runs.record_program_resumed(&p, &run),
                _ => t.runs.record_program_stop(&p, &run, 2, RunStatus::Completed),
            };
            let next = match (op, expected) {
                (0, Partition::Started) => Some(Partition::Suspended),
                (1, Partition::Suspended) => Some(Partition::Started),
                (2, Partition::Started) => Some(Partition::Completed),
                _ => None,
            };
            match next {
                Some(partition) => {
                    prop_assert!(outcome.is_ok());
                    expected = partition;
                }
                None => prop_assert!(matches!(outcome, Err(Error::InvalidState(_)))),
            }
            prop_assert_eq!(t.partitions_of(&p, &run), vec![expected]);
        }
    }
}
