//! Workflow Tests
//!
//! Node links between a workflow run and its child runs, and workflow tokens.

use crate::common::*;
use std::collections::BTreeMap;

#[test]
fn workflow_node_scenario() {
    let t = TestStore::new();
    let (w, c) = (workflow("nightly"), program("aggregate"));
    let (w1, c1) = (RunId::new("w1"), RunId::new("c1"));

    t.start(&w, &w1, 0);
    t.runs
        .record_workflow_program_start(&c, &c1, &w, &w1, "n1", 1, None)
        .unwrap();

    let parent = t.runs.get_run(&w, &w1).unwrap().unwrap();
    assert_eq!(parent.workflow_nodes.get("n1"), Some(&c1));
    let child = t.runs.get_run(&c, &c1).unwrap().unwrap();
    assert_eq!(child.parent_workflow_run, Some(w1));
    assert_eq!(child.status, RunStatus::Running);
    assert_eq!(child.start_ts, 1);
}

#[test]
fn persisted_properties_keep_original_shape() {
    let t = TestStore::new();
    let (w, c) = (workflow("nightly"), program("aggregate"));
    let (w1, c1) = (RunId::new("w1"), RunId::new("c1"));
    t.start(&w, &w1, 0);
    t.runs
        .record_workflow_program_start(&c, &c1, &w, &w1, "n1", 1, Some("twill-7"))
        .unwrap();

    let stored = t.runs.get_run(&w, &w1).unwrap().unwrap().to_stored().unwrap();
    assert_eq!(stored.properties.get("n1").map(String::as_str), Some("c1"));
    assert_eq!(
        stored.properties.get("runtimeArgs").map(String::as_str),
        Some("{}")
    );

    let child = t.runs.get_run(&c, &c1).unwrap().unwrap().to_stored().unwrap();
    assert_eq!(
        child.properties.get("workflowrunid").map(String::as_str),
        Some("w1")
    );
    assert_eq!(child.twill_run_id.as_deref(), Some("twill-7"));
}

#[test]
fn many_nodes_accumulate_on_parent() {
    let t = TestStore::new();
    let w = workflow("fanout");
    let w1 = RunId::generate();
    t.start(&w, &w1, 10);
    for i in 0..5 {
        let child = RunId::generate();
        t.runs
            .record_workflow_program_start(
                &program("step"),
                &child,
                &w,
                &w1,
                &format!("node-{}", i),
                11 + i,
                None,
            )
            .unwrap();
    }
    let parent = t.runs.get_run(&w, &w1).unwrap().unwrap();
    assert_eq!(parent.workflow_nodes.len(), 5);
    assert_eq!(
        t.ids(Some(&program("step")), RunStatus::Running.into()).len(),
        5
    );
}

#[test]
fn node_start_fails_when_workflow_is_not_running() {
    let t = TestStore::new();
    let w = workflow("nightly");
    let w1 = RunId::new("w1");
    t.start(&w, &w1, 0);
    t.runs.record_program_suspend(&w, &w1).unwrap();

    let err = t
        .runs
        .record_workflow_program_start(&program("c"), &RunId::new("c1"), &w, &w1, "n1", 1, None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    assert!(err.to_string().contains("No meta found for associated Workflow"));
}

#[test]
fn token_follows_workflow_through_suspend() {
    let t = TestStore::new();
    let w = workflow("tokens");
    let w1 = RunId::new("w1");
    t.runs
        .record_program_start(&w, &w1, 0, None, BTreeMap::new())
        .unwrap();

    let mut token = WorkflowToken::default();
    token.put(Scope::User, "n1", "threshold", "0.7").unwrap();
    t.runs.update_workflow_token(&w, &w1, &token).unwrap();

    t.runs.record_program_suspend(&w, &w1).unwrap();
    token.put(Scope::System, "n2", "records.out", "100").unwrap();
    t.runs.update_workflow_token(&w, &w1, &token).unwrap();

    t.runs.record_program_resumed(&w, &w1).unwrap();
    t.stop(&w, &w1, 50, RunStatus::Completed);

    let stored = t.runs.get_workflow_token(&w, &w1).unwrap().unwrap();
    assert_eq!(stored.get(Scope::User, "threshold"), Some("0.7"));
    assert_eq!(stored.get_from_node(Scope::System, "records.out", "n2"), Some("100"));
}

#[test]
fn legacy_record_yields_empty_token() {
    let t = TestStore::new();
    let w = workflow("old");
    let w1 = RunId::new("w1");
    t.start(&w, &w1, 0);
    let token = t.runs.get_workflow_token(&w, &w1).unwrap().unwrap();
    assert!(token.is_empty());
    assert_eq!(token.max_size_bytes(), 0);
}

#[test]
fn unknown_workflow_run() {
    let t = TestStore::new();
    let w = workflow("ghost");
    let run = RunId::new("nope");
    assert!(t.runs.get_workflow_token(&w, &run).unwrap().is_none());
    assert!(matches!(
        t.runs.update_workflow_token(&w, &run, &WorkflowToken::default()),
        Err(Error::NotFound(_))
    ));
}
