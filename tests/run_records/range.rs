//! Range Scan Tests
//!
//! `get_running_in_range` window semantics and time-bounded batching.

use crate::common::*;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn window_edges() {
    let t = TestStore::new();
    let p = program("edges");
    let cases = [
        ("ends-at-start", 0, Some(10)),
        ("ends-before", 0, Some(9)),
        ("starts-at-end", 20, None),
        ("starts-before-end", 19, None),
        ("spans", 0, Some(100)),
    ];
    for (name, start, stop) in cases {
        let run = RunId::new(name);
        t.start(&p, &run, start);
        if let Some(stop) = stop {
            t.stop(&p, &run, stop, RunStatus::Completed);
        }
    }

    let found = t.runs.get_running_in_range(10, 20).unwrap();
    let expected: HashSet<RunId> = ["ends-at-start", "starts-before-end", "spans"]
        .into_iter()
        .map(RunId::new)
        .collect();
    assert_eq!(found, expected);
}

#[test]
fn suspended_runs_count_as_running() {
    let t = TestStore::new();
    let p = program("paused");
    let run = RunId::new("p1");
    t.start(&p, &run, 5);
    t.runs.record_program_suspend(&p, &run).unwrap();
    assert!(t.runs.get_running_in_range(1_000, 2_000).unwrap().contains(&run));
    assert!(t.runs.get_running_in_range(0, 5).unwrap().is_empty());
}

#[test]
fn batches_resume_after_budget() {
    // 4s timeout, budget 2s; the ticker costs 1s per reading
    let config = StoreConfig {
        transaction_timeout_secs: 4,
        ..StoreConfig::default()
    };
    let ticker = Arc::new(ManualTicker::with_step(Duration::from_secs(1)));
    let t = TestStore::with_ticker(config, ticker);
    let p = program("batched");
    for i in 0..8 {
        let run = RunId::new(format!("r{}", i));
        t.start(&p, &run, i);
        t.stop(&p, &run, 100, RunStatus::Completed);
    }

    let batches = t
        .runs
        .running_in_range_batches(Partition::Completed, 0, 1_000)
        .unwrap();
    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![3, 3, 2]);

    let all: HashSet<RunId> = batches.into_iter().flatten().collect();
    assert_eq!(all.len(), 8);
    assert_eq!(all, t.runs.get_running_in_range(0, 1_000).unwrap());
}

#[test]
fn batches_see_rows_written_between_batches() {
    let t = TestStore::new();
    let p = program("moving");
    t.start(&p, &RunId::new("a"), 1);
    t.start(&p, &RunId::new("b"), 1);

    // Every reading overshoots the budget, so each batch visits one row
    let ticker = ManualTicker::with_step(Duration::from_secs(5));
    let mut scan = RunningInRangeScan::new(
        Partition::Started,
        0,
        100,
        Duration::from_secs(1),
        &ticker,
    );
    let first = t.db.transaction(|txn| scan.next_batch(txn)).unwrap();
    assert_eq!(first, Some(vec![RunId::new("a")]));

    // Written after the first batch committed, ahead of the cursor
    t.start(&p, &RunId::new("c"), 1);

    let mut rest = Vec::new();
    while let Some(batch) = t.db.transaction(|txn| scan.next_batch(txn)).unwrap() {
        rest.extend(batch);
    }
    assert_eq!(rest, vec![RunId::new("b"), RunId::new("c")]);
    assert!(scan.is_exhausted());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn window_containment(
        runs in prop::collection::vec((0i64..1_000, prop::option::of(0i64..500)), 1..20),
        a in 0i64..1_500,
        width in 0i64..1_500,
    ) {
        let t = TestStore::new();
        let p = program("containment");
        let mut model = HashSet::new();
        let b = a + width;

        for (i, (start, duration)) in runs.iter().enumerate() {
            let run = RunId::new(format!("r{}", i));
            t.start(&p, &run, *start);
            let stop = duration.map(|d| start + d);
            if let Some(stop) = stop {
                t.stop(&p, &run, stop, RunStatus::Completed);
            } else if i % 2 == 0 {
                t.runs.record_program_suspend(&p, &run).unwrap();
            }
            if *start < b && stop.map_or(true, |e| e >= a) {
                model.insert(run);
            }
        }

        prop_assert_eq!(t.runs.get_running_in_range(a, b).unwrap(), model);
    }
}

#[test]
fn finished_runs_leave_no_dead_rows_behind() {
    let t = TestStore::new();
    let p = program("churn");
    for i in 0..500 {
        let run = RunId::new(format!("run-{:04}", i));
        t.start(&p, &run, i);
        t.runs.record_program_suspend(&p, &run).unwrap();
        t.runs.record_program_resumed(&p, &run).unwrap();
        t.stop(&p, &run, i + 1, RunStatus::Completed);
    }

    // One completed row per run and nothing else
    let storage = t.db.storage();
    assert_eq!(storage.live_key_count(), 500);
    assert_eq!(storage.total_versions(), 500);
    assert_eq!(storage.pending_reclaim(), 0);

    for partition in [Partition::Started, Partition::Suspended] {
        let batches = t
            .runs
            .running_in_range_batches(partition, 0, i64::MAX)
            .unwrap();
        assert!(batches.is_empty(), "{} still has rows", partition);
    }
}
