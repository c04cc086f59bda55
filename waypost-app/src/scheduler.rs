//! SLEEPING -> RUNNING -> SUCCESS | FAILURE, forever.
//!
//! Production runs are aligned to wall-clock slots (every `interval_hours` on
//! the hour, UTC) so processing time never accumulates drift. Development runs
//! use a short rolling interval. Failures retry after a fixed short delay with
//! no backoff and no attempt cap.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Timelike, Utc};
use futures::FutureExt;
use tracing::{error, info, warn};
use waypost_config::WaypostConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// One full pipeline execution. `Ok(false)` is an ordinary failed run.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run_once(&self) -> anyhow::Result<bool>;
}

/// Start of the next slot strictly after the current hour.
pub fn next_aligned(now: DateTime<Utc>, interval_hours: u32) -> DateTime<Utc> {
    let interval = interval_hours.max(1);
    let hour_start = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    hour_start + TimeDelta::hours(i64::from(interval - now.hour() % interval))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Aligned { interval_hours: u32, min_slack_minutes: u32 },
    Rolling(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub pace: Pace,
    pub retry: Duration,
}

impl Cadence {
    pub fn from_config(cfg: &WaypostConfig) -> Self {
        let s = &cfg.schedule;
        let pace = if cfg.mode().is_dev() {
            Pace::Rolling(Duration::from_secs(s.dev_interval_secs))
        } else {
            Pace::Aligned {
                interval_hours: s.interval_hours,
                min_slack_minutes: s.min_slack_minutes,
            }
        };
        Self {
            pace,
            retry: Duration::from_secs(s.retry_secs),
        }
    }

    /// Run right away inside the first minutes of a slot, otherwise wait for
    /// the next one.
    pub fn initial_delay(&self, now: DateTime<Utc>) -> Duration {
        match self.pace {
            Pace::Aligned {
                interval_hours,
                min_slack_minutes,
            } => {
                let in_slot = now.hour() % interval_hours.max(1) == 0
                    && now.minute() < min_slack_minutes;
                if in_slot {
                    Duration::ZERO
                } else {
                    until(now, next_aligned(now, interval_hours))
                }
            }
            Pace::Rolling(_) => Duration::ZERO,
        }
    }

    pub fn delay_after(&self, outcome: Outcome, now: DateTime<Utc>) -> Duration {
        match (outcome, self.pace) {
            (Outcome::Failure, _) => self.retry,
            (Outcome::Success, Pace::Aligned { interval_hours, .. }) => {
                until(now, next_aligned(now, interval_hours))
            }
            (Outcome::Success, Pace::Rolling(every)) => every,
        }
    }
}

fn until(now: DateTime<Utc>, later: DateTime<Utc>) -> Duration {
    (later - now).to_std().unwrap_or(Duration::ZERO)
}

pub struct Scheduler {
    job: Arc<dyn Job>,
    cadence: Cadence,
}

impl Scheduler {
    pub fn new(job: Arc<dyn Job>, cadence: Cadence) -> Self {
        Self { job, cadence }
    }

    /// RUNNING: errors and panics both end up as [`Outcome::Failure`].
    pub async fn run_cycle(&self) -> Outcome {
        match AssertUnwindSafe(self.job.run_once()).catch_unwind().await {
            Ok(Ok(true)) => Outcome::Success,
            Ok(Ok(false)) => {
                warn!("scheduler.run_failed");
                Outcome::Failure
            }
            Ok(Err(e)) => {
                error!(error = ?e, "scheduler.run_error");
                Outcome::Failure
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic".into());
                error!(panic = %msg, "scheduler.run_panicked");
                Outcome::Failure
            }
        }
    }

    pub async fn run_forever(&self) {
        let first = self.cadence.initial_delay(Utc::now());
        sleep_logged(first, "initial").await;

        loop {
            let outcome = self.run_cycle().await;
            let delay = self.cadence.delay_after(outcome, Utc::now());
            let reason = match outcome {
                Outcome::Success => "next_run",
                Outcome::Failure => "retry",
            };
            sleep_logged(delay, reason).await;
        }
    }
}

async fn sleep_logged(delay: Duration, reason: &'static str) {
    if delay.is_zero() {
        return;
    }
    let wake = TimeDelta::from_std(delay)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d));
    info!(
        reason,
        secs = delay.as_secs(),
        wake_at = ?wake,
        "scheduler.sleep"
    );
    tokio::time::sleep(delay).await;
}
