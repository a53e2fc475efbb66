use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::triggers::{
    cleanup_old_wishes, send_birthday_notifications, BirthdaySummary, CleanupSummary, Services,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("Unknown scheduled job '{0}'")]
    UnknownJob(String),
}

/// Jobs run by the daily scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledJob {
    Birthdays,
    Cleanup,
}

impl ScheduledJob {
    pub const ALL: [ScheduledJob; 2] = [ScheduledJob::Birthdays, ScheduledJob::Cleanup];

    pub fn name(&self) -> &'static str {
        match self {
            ScheduledJob::Birthdays => "birthdays",
            ScheduledJob::Cleanup => "cleanup",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ScheduleError> {
        Self::ALL
            .into_iter()
            .find(|job| job.name() == name)
            .ok_or_else(|| ScheduleError::UnknownJob(name.to_string()))
    }
}

/// Result of one job run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobReport {
    Birthdays(BirthdaySummary),
    Cleanup(CleanupSummary),
}

/// Run a job once. `now` is the tick time; birthdays use its local date.
pub async fn run_job(services: &Services, job: ScheduledJob, now: DateTime<Local>) -> JobReport {
    match job {
        ScheduledJob::Birthdays => {
            let today: NaiveDate = now.date_naive();
            JobReport::Birthdays(send_birthday_notifications(services, today).await)
        }
        ScheduledJob::Cleanup => {
            JobReport::Cleanup(cleanup_old_wishes(services, now.with_timezone(&Utc)).await)
        }
    }
}

/// Fixed local time of day at which a job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
}

impl DailySchedule {
    pub fn new(time: NaiveTime) -> Self {
        Self { time }
    }

    /// Parse an `HH:MM` time of day.
    pub fn parse(value: &str) -> Result<Self, ScheduleError> {
        NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map(Self::new)
            .map_err(|_| ScheduleError::InvalidTime(value.to_string()))
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// First fire time strictly after `now`, in `now`'s time zone.
    ///
    /// A slot skipped by a DST gap fires an hour later; an ambiguous slot
    /// fires at its earlier instance.
    pub fn next_fire_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        let mut date = now.date_naive();

        // Today and tomorrow always suffice; the third day covers a gap on tomorrow's slot
        for _ in 0..3 {
            let slot = date.and_time(self.time);
            let candidate = tz
                .from_local_datetime(&slot)
                .earliest()
                .or_else(|| tz.from_local_datetime(&(slot + chrono::Duration::hours(1))).earliest());

            if let Some(candidate) = candidate {
                if candidate > *now {
                    return Some(candidate);
                }
            }
            date = date.succ_opt()?;
        }
        None
    }
}

/// Background task firing one job daily at its local time
pub struct SchedulerTask {
    services: Arc<Services>,
    job: ScheduledJob,
    schedule: DailySchedule,
    shutdown: broadcast::Receiver<()>,
}

impl SchedulerTask {
    pub fn new(
        services: Arc<Services>,
        job: ScheduledJob,
        schedule: DailySchedule,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            services,
            job,
            schedule,
            shutdown,
        }
    }

    /// Build one task per job from the scheduler settings.
    pub fn from_settings(
        services: Arc<Services>,
        shutdown: &broadcast::Sender<()>,
    ) -> Result<Vec<Self>, ScheduleError> {
        let settings = services.scheduler.clone();
        let plan = [
            (ScheduledJob::Birthdays, settings.birthday_time.as_str()),
            (ScheduledJob::Cleanup, settings.cleanup_time.as_str()),
        ];

        plan.into_iter()
            .map(|(job, time)| {
                Ok(Self::new(
                    services.clone(),
                    job,
                    DailySchedule::parse(time)?,
                    shutdown.subscribe(),
                ))
            })
            .collect()
    }

    pub fn job(&self) -> ScheduledJob {
        self.job
    }

    /// Sleep until each fire time and run the job, until shutdown.
    pub async fn run(mut self) {
        tracing::info!(
            job = self.job.name(),
            time = %self.schedule.time().format("%H:%M"),
            "Scheduler task started"
        );

        loop {
            let now = Local::now();
            let Some(next) = self.schedule.next_fire_after(&now) else {
                tracing::error!(job = self.job.name(), "No next fire time, stopping");
                break;
            };
            let wait = (next.clone() - now).to_std().unwrap_or(Duration::ZERO);

            tracing::debug!(
                job = self.job.name(),
                next = %next.to_rfc3339(),
                wait_secs = wait.as_secs(),
                "Waiting for next run"
            );

            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(job = self.job.name(), "Scheduler task received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    let report = run_job(&self.services, self.job, Local::now()).await;
                    tracing::info!(job = self.job.name(), report = ?report, "Scheduled job finished");
                }
            }
        }

        tracing::info!(job = self.job.name(), "Scheduler task stopped");
    }
}
