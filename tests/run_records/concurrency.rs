//! Concurrency Tests
//!
//! Racing transitions on the same run: exactly one caller wins, the rest fail
//! with `InvalidState` after retrying on a fresh snapshot.

use crate::common::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn racing_suspends_have_one_winner() {
    let t = TestStore::new();
    let p = program("race");
    let run = RunId::new("r1");
    t.start(&p, &run, 1);

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let runs = t.runs.clone();
            let (p, run, barrier) = (p.clone(), run.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                runs.record_program_suspend(&p, &run)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(matches!(err, Error::InvalidState(_)), "unexpected: {}", err);
    }
    assert_eq!(t.partitions_of(&p, &run), vec![Partition::Suspended]);
}

#[test]
fn disjoint_runs_do_not_interfere() {
    let t = TestStore::new();
    let p = program("parallel");
    let threads = 8;
    let per_thread = 25;

    let handles: Vec<_> = (0..threads)
        .map(|n| {
            let runs = t.runs.clone();
            let p = p.clone();
            thread::spawn(move || {
                for i in 0..per_thread {
                    let run = RunId::new(format!("t{}-{}", n, i));
                    runs.record_program_start(&p, &run, i, None, Default::default())
                        .unwrap();
                    runs.record_program_stop(&p, &run, i + 1, RunStatus::Completed)
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let done = t.ids(Some(&p), RunStatus::Completed.into());
    assert_eq!(done.len(), (threads * per_thread) as usize);
    assert!(t.ids(Some(&p), RunStatus::Running.into()).is_empty());
    let metrics = t.db.metrics();
    assert_eq!(metrics.active_count, 0);
}
