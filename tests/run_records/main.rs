//! Run-Record Store Integration Tests
//!
//! End-to-end tests through the `runstore` facade: lifecycle transitions,
//! listings, workflow links, range scans, configuration and concurrency.

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod config;
mod lifecycle;
mod listing;
mod range;
mod workflow;
