//! Rate governor decisions against a persisted SQLite history.

use chrono::{Duration, Utc};
use plotbox_core::config::RateLimitConfig;
use plotbox_core::{ExecutionResult, UserId};
use plotbox_history::{
    ExecutionHistory, GovernorError, RateGovernor, RateLimitKind, SqliteHistory,
};
use tempfile::TempDir;

fn run(secs: f64) -> ExecutionResult {
    ExecutionResult {
        success: true,
        stdout: String::new(),
        stderr: String::new(),
        artifact: None,
        execution_time_seconds: secs,
    }
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("app.db").display())
}

#[tokio::test]
async fn test_budget_survives_restart() {
    let dir = TempDir::new().unwrap();
    let user = UserId::from("alice");
    let now = Utc::now();
    let governor = RateGovernor::new(RateLimitConfig {
        min_interval_seconds: 5.0,
        cpu_budget_seconds: 15.0,
        cpu_budget_window_seconds: 60.0,
    });

    {
        let history = SqliteHistory::connect(&database_url(&dir)).await.unwrap();
        history
            .record_run(&user, "slow()", &run(9.0), now - Duration::seconds(50))
            .await
            .unwrap();
        history
            .record_run(&user, "slow()", &run(7.0), now - Duration::seconds(20))
            .await
            .unwrap();
        // Outside the window; does not count.
        history
            .record_run(&user, "old()", &run(100.0), now - Duration::seconds(300))
            .await
            .unwrap();
    }

    let history = SqliteHistory::connect(&database_url(&dir)).await.unwrap();
    match governor.check(&history, &user, now).await {
        Err(GovernorError::Limited(limited)) => {
            assert_eq!(limited.kind, RateLimitKind::CpuBudget);
            assert_eq!(limited.retry_after_secs, 10);
        }
        other => panic!("expected a CPU budget rejection, got {:?}", other),
    }

    // Once the oldest run leaves the window the user is admitted again.
    let later = now + Duration::seconds(11);
    governor.check(&history, &user, later).await.unwrap();
}

#[tokio::test]
async fn test_min_interval_from_history() {
    let dir = TempDir::new().unwrap();
    let history = SqliteHistory::connect(&database_url(&dir)).await.unwrap();
    let governor = RateGovernor::new(RateLimitConfig::default());
    let user = UserId::from("bob");
    let now = Utc::now();

    history
        .record_run(&user, "quick()", &run(0.1), now - Duration::seconds(2))
        .await
        .unwrap();

    match governor.check(&history, &user, now).await {
        Err(GovernorError::Limited(limited)) => {
            assert_eq!(limited.kind, RateLimitKind::MinInterval);
            assert_eq!(limited.retry_after_secs, 3);
        }
        other => panic!("expected a min interval rejection, got {:?}", other),
    }

    governor
        .check(&history, &UserId::from("carol"), now)
        .await
        .unwrap();
}
