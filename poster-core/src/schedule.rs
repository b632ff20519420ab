use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::error::ConfigError;

/// Hook name the import job is registered under.
pub const SCHEDULE_HOOK: &str = "rssposter_schedule";

const HOUR: u64 = 3600;

/// Named recurrence understood by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recurrence {
    Hourly,
    FourHours,
    EightHours,
    TwiceDaily,
    SixteenHours,
    TwentyHours,
    Daily,
}

impl Recurrence {
    pub const ALL: [Recurrence; 7] = [
        Recurrence::Hourly,
        Recurrence::FourHours,
        Recurrence::EightHours,
        Recurrence::TwiceDaily,
        Recurrence::SixteenHours,
        Recurrence::TwentyHours,
        Recurrence::Daily,
    ];

    /// Maps the hours selector from the settings. Unknown values run every four hours.
    pub fn from_hours(hours: u32) -> Self {
        match hours {
            1 => Recurrence::Hourly,
            8 => Recurrence::EightHours,
            12 => Recurrence::TwiceDaily,
            16 => Recurrence::SixteenHours,
            20 => Recurrence::TwentyHours,
            24 => Recurrence::Daily,
            _ => Recurrence::FourHours,
        }
    }

    pub fn is_known_hours(hours: u32) -> bool {
        Self::ALL.iter().any(|r| r.hours() == hours)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Recurrence::Hourly => "hourly",
            Recurrence::FourHours => "four_hours",
            Recurrence::EightHours => "eight_hours",
            Recurrence::TwiceDaily => "twicedaily",
            Recurrence::SixteenHours => "sixteen_hours",
            Recurrence::TwentyHours => "twenty_hours",
            Recurrence::Daily => "daily",
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            Recurrence::Hourly => "Once Hourly",
            Recurrence::FourHours => "Every Four Hours",
            Recurrence::EightHours => "Every Eight Hours",
            Recurrence::TwiceDaily => "Twice Daily",
            Recurrence::SixteenHours => "Every Sixteen Hours",
            Recurrence::TwentyHours => "Every Twenty Hours",
            Recurrence::Daily => "Once Daily",
        }
    }

    pub fn hours(&self) -> u32 {
        match self {
            Recurrence::Hourly => 1,
            Recurrence::FourHours => 4,
            Recurrence::EightHours => 8,
            Recurrence::TwiceDaily => 12,
            Recurrence::SixteenHours => 16,
            Recurrence::TwentyHours => 20,
            Recurrence::Daily => 24,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.hours()) * HOUR)
    }

    /// Recurrences a stock platform scheduler does not ship with.
    pub fn custom_recurrences() -> [Recurrence; 4] {
        [
            Recurrence::FourHours,
            Recurrence::EightHours,
            Recurrence::SixteenHours,
            Recurrence::TwentyHours,
        ]
    }
}

/// Work the scheduler invokes on every tick.
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    async fn run(&self);
}

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Returns `false` and leaves the existing recurrence untouched when `hook`
    /// is already scheduled. A zero `interval` is rejected the same way.
    async fn schedule_recurring(
        &self,
        hook: &str,
        interval: Duration,
        job: Arc<dyn ScheduledJob>,
    ) -> bool;

    /// Returns `false` when nothing was scheduled under `hook`.
    async fn cancel_recurring(&self, hook: &str) -> bool;

    async fn is_scheduled(&self, hook: &str) -> bool;

    /// Re-registers `hook` after a settings change.
    async fn reschedule(&self, hook: &str, interval: Duration, job: Arc<dyn ScheduledJob>) {
        self.cancel_recurring(hook).await;
        self.schedule_recurring(hook, interval, job).await;
    }
}

struct Recurring {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

/// Runs each hook on its own tokio task.
#[derive(Default)]
pub struct TokioScheduler {
    hooks: Mutex<HashMap<String, Recurring>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every registered hook and waits for the tasks to end.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, Recurring)> = self.hooks.lock().await.drain().collect();
        for (hook, recurring) in drained {
            stop(&hook, recurring).await;
        }
    }
}

async fn stop(hook: &str, recurring: Recurring) {
    let _ = recurring.cancel_tx.send(());
    if let Err(err) = recurring.join.await {
        warn!(hook, error = %err, "scheduled task ended abnormally");
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn schedule_recurring(
        &self,
        hook: &str,
        interval: Duration,
        job: Arc<dyn ScheduledJob>,
    ) -> bool {
        if interval.is_zero() {
            warn!(hook, "refusing to schedule with a zero interval");
            return false;
        }
        let mut hooks = self.hooks.lock().await;
        if hooks.contains_key(hook) {
            debug!(hook, "already scheduled");
            return false;
        }

        let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
        let name = hook.to_owned();
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel_rx.recv() => {
                        info!(hook = %name, "recurrence cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = cancel_rx.recv() => {
                                info!(hook = %name, "recurrence cancelled during run");
                                break;
                            }
                            _ = job.run() => {}
                        }
                    }
                }
            }
        });

        info!(hook, interval_secs = interval.as_secs(), "recurrence scheduled");
        hooks.insert(hook.to_owned(), Recurring { cancel_tx, join });
        true
    }

    async fn cancel_recurring(&self, hook: &str) -> bool {
        let removed = self.hooks.lock().await.remove(hook);
        match removed {
            Some(recurring) => {
                stop(hook, recurring).await;
                true
            }
            None => false,
        }
    }

    async fn is_scheduled(&self, hook: &str) -> bool {
        self.hooks.lock().await.contains_key(hook)
    }
}

/// Registers the import job at the interval picked in the settings.
///
/// `settings` is `None` when nothing has been saved yet.
pub async fn set_fetch_interval<S: Scheduler + ?Sized>(
    scheduler: &S,
    settings: Option<&FeedConfig>,
    job: Arc<dyn ScheduledJob>,
) -> Result<Recurrence, ConfigError> {
    let feed = settings.ok_or(ConfigError::MissingSchedule)?;
    let recurrence = feed.recurrence();
    if scheduler
        .schedule_recurring(SCHEDULE_HOOK, recurrence.interval(), job)
        .await
    {
        info!(recurrence = recurrence.name(), "feed import scheduled");
    }
    Ok(recurrence)
}
