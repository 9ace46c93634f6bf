//! Config save/load roundtrip integration tests.
//!
//! These tests verify that configuration can be serialized, written to disk,
//! and loaded back with identical field values, and that the loaded values
//! reach the sandbox budget and the rate governor.

use plotbox_core::config::Config;
use plotbox_core::ResourceBudget;
use plotbox_history::{RateGovernor, RateState};
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plotbox.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.server.port, config.server.port);
    assert_eq!(loaded.server.bind, config.server.bind);
    assert_eq!(
        loaded.execution.timeout_seconds,
        config.execution.timeout_seconds
    );
    assert_eq!(
        loaded.rate_limit.cpu_budget_window_seconds,
        config.rate_limit.cpu_budget_window_seconds
    );
    assert_eq!(loaded.history.database_url, config.history.database_url);
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plotbox.json5");

    let mut config = Config::default();
    config.server.port = 9090;
    config.execution.memory_limit_mb = 256;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.server.port, 9090);
    assert_eq!(
        ResourceBudget::from(&loaded.execution).memory_bytes,
        256 * 1024 * 1024
    );
}

#[test]
fn test_hand_written_json5() {
    let config = Config::parse(
        r#"{
            // Tighter limits for a classroom
            execution: { timeout_seconds: 1.5 },
            rate_limit: { min_interval_seconds: 2, cpu_budget_seconds: 0 },
        }"#,
    )
    .unwrap();
    config.validate().unwrap();

    let budget = ResourceBudget::from(&config.execution);
    assert_eq!(budget.wall_clock_seconds, 1.5);
    assert_eq!(budget.cpu_seconds_ceil(), 2);

    // A zero budget switches the CPU check off.
    let governor = RateGovernor::new(config.rate_limit.clone());
    let state = RateState {
        cpu_seconds_in_window: 1e6,
        ..Default::default()
    };
    assert!(governor.evaluate(&state, chrono::Utc::now()).is_ok());
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/plotbox.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    let result = Config::parse("not valid json");
    assert!(result.is_err());
}
