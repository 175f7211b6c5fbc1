//! Configuration Tests
//!
//! Loading `runstore.toml` and its effect on the store.

use crate::common::*;
use runstore::CONFIG_FILE_NAME;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn open_creates_default_config() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path()).unwrap();
    let written = std::fs::read_to_string(dir.path().join(CONFIG_FILE_NAME)).unwrap();
    assert!(written.contains("transaction_timeout_secs"));
    assert_eq!(db.config(), &StoreConfig::default());
    assert_eq!(db.config().scan_budget(), Duration::from_secs(15));
}

#[test]
fn open_honours_custom_values() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "transaction_timeout_secs = 60\nscan_budget_divisor = 4\n\n[retry]\nmax_retries = 7\n",
    )
    .unwrap();
    let db = Database::open(dir.path()).unwrap();
    assert_eq!(db.config().scan_budget(), Duration::from_secs(15));
    assert_eq!(db.config().retry.max_retries, 7);
    assert_eq!(db.config().retry.base_delay_ms, 10);
}

#[test]
fn open_rejects_bad_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "scan_budget_divisor = 0\n").unwrap();
    assert!(matches!(
        Database::open(dir.path()),
        Err(Error::InvalidInput(_))
    ));

    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "transaction_timeout_secs = \"x\"\n")
        .unwrap();
    assert!(matches!(Database::open(dir.path()), Err(Error::Config(_))));
}
