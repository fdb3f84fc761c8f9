//! Cron-based scheduler that submits a batch on every tick

use crate::batch::dispatcher::Dispatcher;
use crate::config::Universe;
use crate::error::SchedulerError;
use cron::Schedule;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info};

/// Convert an interval to a six-field cron expression (second minute hour day month weekday).
///
/// Step fields restart at every boundary of the next unit, so only intervals that divide that
/// unit evenly fire at a uniform cadence. Anything else yields `None`.
pub fn interval_to_cron(interval_seconds: u64) -> Option<String> {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 3600;
    const DAY: u64 = 86_400;

    match interval_seconds {
        0 => None,
        s if s < MINUTE => (MINUTE % s == 0).then(|| format!("*/{} * * * * *", s)),
        s if s < HOUR => {
            let minutes = s / MINUTE;
            (s % MINUTE == 0 && MINUTE % minutes == 0)
                .then(|| format!("0 */{} * * * *", minutes))
        }
        s if s < DAY => {
            let hours = s / HOUR;
            (s % HOUR == 0 && 24 % hours == 0).then(|| format!("0 0 */{} * * *", hours))
        }
        DAY => Some("0 0 0 * * *".to_string()),
        _ => None,
    }
}

/// When the scheduler fires
#[derive(Debug, Clone)]
pub enum Cadence {
    /// Wall-clock aligned ticks
    Cron(Schedule),
    /// Fixed period measured from `start`
    Every(Duration),
}

impl Cadence {
    pub fn from_interval(interval_seconds: u64) -> Result<Self, SchedulerError> {
        if interval_seconds == 0 {
            return Err(SchedulerError::Disabled);
        }
        match interval_to_cron(interval_seconds) {
            Some(expr) => Schedule::from_str(&expr)
                .map(Cadence::Cron)
                .map_err(|e| SchedulerError::InvalidCron {
                    expr,
                    reason: e.to_string(),
                }),
            None => Ok(Cadence::Every(Duration::from_secs(interval_seconds))),
        }
    }

    async fn ticker(&self) -> Ticker {
        match self {
            Cadence::Cron(schedule) => Ticker::Cron(schedule.clone()),
            Cadence::Every(every) => {
                let mut period = tokio::time::interval(*every);
                period.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // the first tick completes immediately
                period.tick().await;
                Ticker::Every(period)
            }
        }
    }
}

enum Ticker {
    Cron(Schedule),
    Every(Interval),
}

impl Ticker {
    async fn tick(&mut self) {
        match self {
            Ticker::Cron(schedule) => match schedule.upcoming(chrono::Utc).next() {
                Some(next_tick) => {
                    let now = chrono::Utc::now();
                    if next_tick > now {
                        let duration = (next_tick - now).to_std().unwrap_or_default();
                        tokio::time::sleep(duration).await;
                    }
                }
                None => tokio::time::sleep(Duration::from_secs(60)).await,
            },
            Ticker::Every(period) => {
                period.tick().await;
            }
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Cron(schedule) => write!(f, "cron {}", schedule),
            Cadence::Every(period) => write!(f, "every {}s", period.as_secs()),
        }
    }
}

pub struct JobScheduler {
    dispatcher: Arc<Dispatcher>,
    universe: Universe,
    cadence: Cadence,
    handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl JobScheduler {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        universe: Universe,
        interval_seconds: u64,
    ) -> Result<Self, SchedulerError> {
        let cadence = Cadence::from_interval(interval_seconds)?;

        info!(
            interval = interval_seconds,
            cadence = %cadence,
            symbols = ?universe.symbols,
            strategies = ?universe.strategies,
            "JobScheduler: created with interval {}s ({})",
            interval_seconds,
            cadence
        );

        Ok(Self {
            dispatcher,
            universe,
            cadence,
            handle: Arc::new(RwLock::new(None)),
        })
    }

    pub fn cadence(&self) -> &Cadence {
        &self.cadence
    }

    pub async fn start(&self) {
        let dispatcher = self.dispatcher.clone();
        let universe = self.universe.clone();
        let cadence = self.cadence.clone();

        let handle = tokio::spawn(async move {
            info!(cadence = %cadence, "JobScheduler: started, waiting for first tick...");

            let mut ticker = cadence.ticker().await;
            loop {
                ticker.tick().await;

                match dispatcher
                    .submit_batch(&universe.symbols, &universe.strategies)
                    .await
                {
                    Ok(batch_id) => info!(batch_id = %batch_id, "JobScheduler: batch submitted"),
                    Err(e) => error!(error = %e, "JobScheduler: batch submission failed"),
                }
            }
        });

        *self.handle.write().await = Some(handle);
        info!("JobScheduler: started successfully");
    }

    pub async fn stop(&self) {
        if let Some(h) = self.handle.write().await.take() {
            h.abort();
            info!("JobScheduler: stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle.read().await.is_some()
    }
}
