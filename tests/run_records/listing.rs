//! Listing Tests
//!
//! Status filters, time windows, ordering of completed runs and the
//! relationship between `All` and the per-status listings.

use crate::common::*;
use proptest::prelude::*;
use std::collections::HashSet;

#[test]
fn status_filter_strings() {
    for (text, expected) in [
        ("all", RunStatusFilter::All),
        ("RUNNING", RunStatus::Running.into()),
        ("Suspended", RunStatus::Suspended.into()),
        ("completed", RunStatus::Completed.into()),
        ("killed", RunStatus::Killed.into()),
        ("failed", RunStatus::Failed.into()),
    ] {
        assert_eq!(text.parse::<RunStatusFilter>().unwrap(), expected);
    }
    let err = "finished".parse::<RunStatusFilter>().unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(err.to_string().contains("finished"));
}

#[test]
fn completed_listing_is_newest_first() {
    let t = TestStore::new();
    let p = program("history");
    for ts in [300, 100, 500, 200, 400] {
        let run = RunId::from_time(ts);
        t.start(&p, &run, ts);
        t.stop(&p, &run, ts + 10, RunStatus::Completed);
    }
    let starts: Vec<i64> = t
        .runs
        .get_runs(Some(&p), RunStatus::Completed.into(), 0, i64::MAX, 100)
        .unwrap()
        .iter()
        .map(|r| r.start_ts)
        .collect();
    assert_eq!(starts, vec![500, 400, 300, 200, 100]);

    let latest_two: Vec<i64> = t
        .runs
        .get_runs(Some(&p), RunStatus::Completed.into(), 0, i64::MAX, 2)
        .unwrap()
        .iter()
        .map(|r| r.start_ts)
        .collect();
    assert_eq!(latest_two, vec![500, 400]);
}

#[test]
fn window_applies_to_every_partition() {
    let t = TestStore::new();
    let p = program("window");
    let (early, mid, late) = (RunId::new("early"), RunId::new("mid"), RunId::new("late"));
    t.start(&p, &early, 5);
    t.start(&p, &mid, 50);
    t.start(&p, &late, 500);
    t.runs.record_program_suspend(&p, &mid).unwrap();
    t.stop(&p, &late, 600, RunStatus::Failed);

    let in_window: HashSet<RunId> = t
        .runs
        .get_runs(Some(&p), RunStatusFilter::All, 10, 501, 10)
        .unwrap()
        .into_iter()
        .map(|r| r.run_id)
        .collect();
    assert_eq!(in_window, [mid, late].into_iter().collect());
}

#[test]
fn listing_without_program_spans_namespaces() {
    let t = TestStore::new();
    let a = ProgramId::new("ns1", "app", ProgramType::Spark, "job");
    let b = ProgramId::new("ns2", "other", ProgramType::Service, "api");
    t.start(&a, &RunId::new("a1"), 1);
    t.start(&b, &RunId::new("b1"), 2);
    t.stop(&b, &RunId::new("b1"), 3, RunStatus::Completed);

    assert_eq!(t.ids(None, RunStatusFilter::All).len(), 2);
    assert_eq!(t.ids(None, RunStatus::Running.into()), vec![RunId::new("a1")]);
    assert_eq!(t.ids(None, RunStatus::Completed.into()), vec![RunId::new("b1")]);
}

#[test]
fn all_programs_with_predicate() {
    let t = TestStore::new();
    for (i, name) in ["x", "y", "z"].iter().enumerate() {
        t.runs
            .record_program_start(
                &program(name),
                &RunId::new(format!("run-{}", name)),
                i as i64,
                if i % 2 == 0 { Some("twill") } else { None },
                Default::default(),
            )
            .unwrap();
    }
    let with_twill = t
        .runs
        .get_runs_all_programs(RunStatus::Running.into(), &|r: &RunRecord| {
            r.twill_run_id.is_some()
        })
        .unwrap();
    assert_eq!(with_twill.len(), 2);
}

#[test]
fn legacy_run_ids_are_found_after_completion() {
    let t = TestStore::new();
    let p = program("legacy");
    let legacy = RunId::new("0b5e8f2c-93a1-4f6e-b1c2-7d8e9f001122");
    t.start(&p, &legacy, 42);
    t.stop(&p, &legacy, 43, RunStatus::Completed);
    for i in 0..10 {
        let run = RunId::from_time(100 + i);
        t.start(&p, &run, 100 + i);
        t.stop(&p, &run, 200, RunStatus::Completed);
    }
    let record = t.runs.get_run(&p, &legacy).unwrap().unwrap();
    assert_eq!(record.start_ts, 42);
}

/// What to do with a generated run
#[derive(Debug, Clone, Copy)]
enum Fate {
    Run,
    Suspend,
    Stop(RunStatus),
}

fn fate() -> impl Strategy<Value = Fate> {
    prop_oneof![
        Just(Fate::Run),
        Just(Fate::Suspend),
        Just(Fate::Stop(RunStatus::Completed)),
        Just(Fate::Stop(RunStatus::Killed)),
        Just(Fate::Stop(RunStatus::Failed)),
    ]
}

fn populate(t: &TestStore, p: &ProgramId, runs: &[(i64, Fate)]) {
    for (i, (start_ts, fate)) in runs.iter().enumerate() {
        let run = RunId::new(format!("run-{}", i));
        t.start(p, &run, *start_ts);
        match fate {
            Fate::Run => {}
            Fate::Suspend => t.runs.record_program_suspend(p, &run).unwrap(),
            Fate::Stop(status) => t.stop(p, &run, start_ts + 1, *status),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn completed_scan_is_descending(starts in prop::collection::hash_set(0i64..1_000_000, 1..20)) {
        let t = TestStore::new();
        let p = program("desc");
        let runs: Vec<(i64, Fate)> = starts
            .iter()
            .map(|s| (*s, Fate::Stop(RunStatus::Completed)))
            .collect();
        populate(&t, &p, &runs);

        let listed: Vec<i64> = t
            .runs
            .get_runs(Some(&p), RunStatus::Completed.into(), 0, i64::MAX, usize::MAX)
            .unwrap()
            .iter()
            .map(|r| r.start_ts)
            .collect();
        let mut expected: Vec<i64> = starts.into_iter().collect();
        expected.sort_unstable_by(|a, b| b.cmp(a));
        prop_assert_eq!(listed, expected);
    }

    #[test]
    fn all_is_union_of_statuses(runs in prop::collection::vec((0i64..10_000, fate()), 0..24)) {
        let t = TestStore::new();
        let p = program("union");
        populate(&t, &p, &runs);

        let all = t.ids(Some(&p), RunStatusFilter::All);
        let mut union: Vec<RunId> = [
            RunStatus::Running,
            RunStatus::Suspended,
            RunStatus::Completed,
            RunStatus::Killed,
            RunStatus::Failed,
        ]
        .into_iter()
        .flat_map(|status| t.ids(Some(&p), status.into()))
        .collect();
        union.sort();

        let distinct: HashSet<&RunId> = all.iter().collect();
        prop_assert_eq!(distinct.len(), all.len());
        prop_assert_eq!(all.len(), runs.len());
        prop_assert_eq!(all, union);
    }

    #[test]
    fn completed_window_matches_model(
        starts in prop::collection::vec(0i64..1_000, 1..20),
        lo in 0i64..1_000,
        span in 0i64..1_000,
    ) {
        let t = TestStore::new();
        let p = program("model");
        let runs: Vec<(i64, Fate)> = starts
            .iter()
            .map(|s| (*s, Fate::Stop(RunStatus::Killed)))
            .collect();
        populate(&t, &p, &runs);

        let hi = lo + span;
        let mut listed: Vec<i64> = t
            .runs
            .get_runs(Some(&p), RunStatus::Killed.into(), lo, hi, usize::MAX)
            .unwrap()
            .iter()
            .map(|r| r.start_ts)
            .collect();
        listed.sort_unstable();
        let mut expected: Vec<i64> = starts.into_iter().filter(|s| *s >= lo && *s < hi).collect();
        expected.sort_unstable();
        prop_assert_eq!(listed, expected);
    }
}
