//! Command scheduler
//!
//! Fires a job on a [`Schedule`], independently of read activity. Each firing
//! runs as its own task, so a slow firing never delays the next one and two
//! firings may overlap.

mod cron;
mod schedule;

pub use cron::CronExpr;
pub use schedule::Schedule;

use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Recurring trigger for command firings
pub struct CommandScheduler {
    schedule: Schedule,
}

impl CommandScheduler {
    pub fn new(schedule: Schedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Start firing `job` until `token` is cancelled.
    ///
    /// `job` receives the 1-based firing number.
    pub fn start<F, Fut>(self, token: CancellationToken, job: F) -> SchedulerHandle
    where
        F: Fn(u64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let firings = Arc::new(AtomicU64::new(0));
        let tracker = TaskTracker::new();

        let task = {
            let token = token.clone();
            let firings = firings.clone();
            let tracker = tracker.clone();
            let schedule = self.schedule;

            tokio::spawn(async move {
                info!("Command scheduler started ({})", schedule);

                let fire = || {
                    let number = firings.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!("Firing {}", number);
                    tracker.spawn(job(number));
                };

                match &schedule {
                    Schedule::Every(period) => {
                        let mut ticker = interval_at(Instant::now() + *period, *period);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                        loop {
                            tokio::select! {
                                biased;
                                _ = token.cancelled() => break,
                                _ = ticker.tick() => fire(),
                            }
                        }
                    }
                    Schedule::Cron { .. } => loop {
                        let Some(delay) = schedule.delay_from(Utc::now()) else {
                            warn!("Schedule '{}' will never fire again", schedule);
                            token.cancelled().await;
                            break;
                        };

                        tokio::select! {
                            biased;
                            _ = token.cancelled() => break,
                            _ = sleep(delay) => fire(),
                        }
                    },
                }

                info!("Command scheduler stopped");
            })
        };

        SchedulerHandle {
            token,
            task,
            tracker,
            firings,
        }
    }
}

/// Running scheduler
pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    tracker: TaskTracker,
    firings: Arc<AtomicU64>,
}

impl SchedulerHandle {
    /// Number of firings triggered so far
    pub fn firings(&self) -> u64 {
        self.firings.load(Ordering::Relaxed)
    }

    /// Stop scheduling and wait for firings already in flight.
    ///
    /// No firing starts after this is called. Returns the total number of
    /// firings.
    pub async fn stop(self) -> u64 {
        self.token.cancel();

        if let Err(e) = self.task.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }

        self.tracker.close();
        self.tracker.wait().await;

        self.firings.load(Ordering::Relaxed)
    }
}
