//! Per-user admission control.
//!
//! Two independent checks run in order: a minimum spacing between runs, then
//! a sliding-window CPU budget. The decision itself is pure; [`RateGovernor::check`]
//! only gathers a [`RateState`] from history before deciding.

use crate::store::ExecutionHistory;
use crate::HistoryError;
use chrono::{DateTime, Utc};
use plotbox_core::config::RateLimitConfig;
use plotbox_core::UserId;
use thiserror::Error;
use tracing::{debug, warn};

/// What the history says about one user at a point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateState {
    pub last_run: Option<DateTime<Utc>>,
    pub cpu_seconds_in_window: f64,
    pub oldest_run_in_window: Option<DateTime<Utc>>,
}

/// Which check refused the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    MinInterval,
    CpuBudget,
}

/// A refused run, with a whole-second retry hint.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct RateLimited {
    pub kind: RateLimitKind,
    pub message: String,
    pub retry_after_secs: u64,
}

/// Errors from [`RateGovernor::check`].
#[derive(Debug, Error)]
pub enum GovernorError {
    #[error(transparent)]
    Limited(#[from] RateLimited),

    #[error("History error: {0}")]
    History(#[from] HistoryError),
}

/// Admits or rejects runs from a user's history.
#[derive(Debug, Clone, Default)]
pub struct RateGovernor {
    config: RateLimitConfig,
}

impl RateGovernor {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Decide on a run at `now` given the user's state.
    pub fn evaluate(&self, state: &RateState, now: DateTime<Utc>) -> Result<(), RateLimited> {
        let interval = self.config.min_interval_seconds;

        if let Some(last) = state.last_run {
            let wait = interval - seconds_between(last, now);
            if wait > 0.0 {
                let retry_after_secs = round_up(wait);
                return Err(RateLimited {
                    kind: RateLimitKind::MinInterval,
                    message: format!(
                        "Runs must be at least {} seconds apart. Please wait {} more seconds.",
                        whole(interval),
                        retry_after_secs
                    ),
                    retry_after_secs,
                });
            }
        }

        let budget = self.config.cpu_budget_seconds;
        if budget <= 0.0 || state.cpu_seconds_in_window < budget {
            return Ok(());
        }

        let window = self.config.cpu_budget_window_seconds;
        let wait = match state.oldest_run_in_window {
            None => interval,
            Some(oldest) => (window - seconds_between(oldest, now)).max(1.0),
        };
        let retry_after_secs = round_up(wait);
        Err(RateLimited {
            kind: RateLimitKind::CpuBudget,
            message: format!(
                "CPU usage limit reached: {} seconds allowed per {} seconds. Please wait {} more seconds.",
                whole(budget),
                whole(window),
                retry_after_secs
            ),
            retry_after_secs,
        })
    }

    /// Read the user's state from history.
    pub async fn state(
        &self,
        history: &dyn ExecutionHistory,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> crate::Result<RateState> {
        let last_run = history.last_run_timestamp(user).await?;
        let window = self.config.cpu_budget_window_seconds;
        if self.config.cpu_budget_seconds <= 0.0 {
            return Ok(RateState {
                last_run,
                ..Default::default()
            });
        }

        let cpu_seconds_in_window = history.total_cpu_seconds_since(user, window, now).await?;
        let oldest_run_in_window = history
            .oldest_run_timestamp_within_window(user, window, now)
            .await?;

        Ok(RateState {
            last_run,
            cpu_seconds_in_window,
            oldest_run_in_window,
        })
    }

    /// Query history and decide on a run at `now`.
    pub async fn check(
        &self,
        history: &dyn ExecutionHistory,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), GovernorError> {
        let state = self.state(history, user, now).await?;
        debug!(user = %user, ?state, "Evaluating rate limits");

        self.evaluate(&state, now).map_err(|limited| {
            warn!(
                user = %user,
                kind = ?limited.kind,
                retry_after = limited.retry_after_secs,
                "Run rejected by rate limit"
            );
            GovernorError::Limited(limited)
        })
    }
}

/// Seconds from `earlier` to `later`, never negative.
fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let millis = (later - earlier).num_milliseconds();
    (millis as f64 / 1000.0).max(0.0)
}

fn round_up(seconds: f64) -> u64 {
    seconds.ceil().max(0.0) as u64
}

fn whole(seconds: f64) -> i64 {
    seconds.trunc() as i64
}
