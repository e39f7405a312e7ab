//! Poll scheduling with per-tariff-type retry and backoff
//!
//! Each configured tariff type gets its own poller task driving the cycle
//! `Idle -> Fetching -> {Idle, Backoff, Halted}`. Failures of one type never
//! affect another, and none of them are fatal to the process.

use crate::cache::TariffCache;
use crate::config::Config;
use crate::error::{FetchError, FetchFault, ParseError};
use crate::esit::ScheduleSource;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::schedule::{TariffType, parse_schedule};
use crate::stats::day_bounds;
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval, sleep};

/// Poll cycle state for one tariff type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Waiting for the next regular tick
    Idle,
    /// A fetch is in flight
    Fetching,
    /// Sleeping before a retry within the current cycle
    Backoff { attempt: u32 },
    /// Stopped until reconfiguration (bad credentials or unknown tariff)
    Halted,
}

/// What went wrong in one fetch attempt
enum CycleError {
    Fetch(FetchError),
    Parse(ParseError),
}

impl CycleError {
    fn fault(&self) -> FetchFault {
        match self {
            CycleError::Fetch(err) => FetchFault::from(err),
            CycleError::Parse(_) => FetchFault::Parse,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, CycleError::Fetch(err) if err.is_terminal())
    }

    fn is_retryable(&self) -> bool {
        matches!(self, CycleError::Fetch(err) if err.is_retryable())
    }

    fn message(&self) -> String {
        match self {
            CycleError::Fetch(err) => err.to_string(),
            CycleError::Parse(err) => err.to_string(),
        }
    }
}

/// Periodic fetch-parse-refresh driver for a single tariff type
pub struct TariffPoller {
    tariff_type: TariffType,
    source: Arc<dyn ScheduleSource>,
    cache: Arc<TariffCache>,
    config: Config,
    tz: Tz,
    state: PollState,
    logger: StructuredLogger,
}

impl TariffPoller {
    pub fn new(
        tariff_type: TariffType,
        source: Arc<dyn ScheduleSource>,
        cache: Arc<TariffCache>,
        config: Config,
        tz: Tz,
    ) -> Self {
        let logger = get_logger_with_context(
            LogContext::new("poller").with_tariff_type(tariff_type.as_str().to_string()),
        );
        Self {
            tariff_type,
            source,
            cache,
            config,
            tz,
            state: PollState::Idle,
            logger,
        }
    }

    /// Current cycle state
    pub fn state(&self) -> PollState {
        self.state
    }

    /// Query window for a cycle starting at `now`: local midnight of today
    /// through local midnight two days later (exclusive). A configured
    /// `query_year` substitutes the year, clamping the day to 28 when the
    /// date does not exist in the target year.
    fn query_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let mut reference = now.with_timezone(&self.tz);
        if let Some(year) = self.config.polling.query_year {
            reference = reference.with_year(year).unwrap_or_else(|| {
                reference
                    .with_day(28)
                    .and_then(|d| d.with_year(year))
                    .unwrap_or(reference)
            });
        }
        let reference_utc = reference.with_timezone(&Utc);
        let (start, _) = day_bounds(self.tz, reference_utc, 0);
        let (_, end) = day_bounds(self.tz, reference_utc, 1);
        (start, end)
    }

    /// Backoff delay before retry `attempt` (1-based), exponential and
    /// capped at both the configured cap and the update interval
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let polling = &self.config.polling;
        let base = polling.backoff_base_seconds as f64;
        let factor = polling.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let cap = polling
            .backoff_cap_seconds
            .min(polling.update_interval_minutes * 60) as f64;
        Duration::from_secs_f64((base * factor).min(cap).max(0.0))
    }

    /// One fetch-parse-refresh pass
    async fn fetch_once(&self) -> std::result::Result<usize, CycleError> {
        let now = Utc::now();
        let (start, end) = self.query_window(now);
        let payload = self
            .source
            .fetch(self.tariff_type, start, end)
            .await
            .map_err(CycleError::Fetch)?;
        let schedule = parse_schedule(
            &payload,
            self.tariff_type,
            self.config.tariffs.component.as_deref(),
            end,
            now,
        )
        .map_err(CycleError::Parse)?;
        let slot_count = schedule.slots.len();
        self.cache.refresh(self.tariff_type, schedule);
        Ok(slot_count)
    }

    /// One poll cycle with intra-cycle retries.
    ///
    /// Returns `false` when the poller should stop (terminal failure or
    /// shutdown observed during a backoff sleep).
    async fn run_cycle(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let max_retries = self.config.polling.max_retries.max(1);
        let mut attempt = 1u32;
        loop {
            self.state = PollState::Fetching;
            match self.fetch_once().await {
                Ok(slot_count) => {
                    self.logger
                        .info(&format!("Refreshed schedule with {} slots", slot_count));
                    self.state = PollState::Idle;
                    return true;
                }
                Err(err) => {
                    self.cache
                        .record_failure(self.tariff_type, err.fault(), Utc::now());

                    if err.is_terminal() {
                        self.logger.error(&format!(
                            "Stopping polling until reconfiguration: {}",
                            err.message()
                        ));
                        self.state = PollState::Halted;
                        return false;
                    }

                    if !err.is_retryable() || attempt >= max_retries {
                        self.logger.warn(&format!(
                            "Giving up until next tick (attempt {}/{}): {}",
                            attempt,
                            max_retries,
                            err.message()
                        ));
                        self.state = PollState::Idle;
                        return true;
                    }

                    let delay = self.backoff_delay(attempt);
                    self.logger.warn(&format!(
                        "Retrying in {:.0?} (attempt {}/{}): {}",
                        delay,
                        attempt,
                        max_retries,
                        err.message()
                    ));
                    self.state = PollState::Backoff { attempt };
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = shutdown.changed() => return false,
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Drive poll cycles until shutdown or a terminal failure.
    ///
    /// The first tick fires immediately, so startup does not wait a full
    /// interval for the initial schedule.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(
            self.config.polling.update_interval_minutes * 60,
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if !self.run_cycle(&mut shutdown).await {
                break;
            }
        }
        self.logger.debug("Poller stopped");
    }
}

/// Handle over the per-type poller tasks
pub struct PollerSet {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl PollerSet {
    /// Spawn one poller task per configured tariff type
    pub fn spawn(
        source: Arc<dyn ScheduleSource>,
        cache: Arc<TariffCache>,
        config: &Config,
        tz: Tz,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = config
            .tariffs
            .types
            .iter()
            .map(|tariff_type| {
                let poller = TariffPoller::new(
                    *tariff_type,
                    Arc::clone(&source),
                    Arc::clone(&cache),
                    config.clone(),
                    tz,
                );
                tokio::spawn(poller.run(shutdown_rx.clone()))
            })
            .collect();
        Self {
            handles,
            shutdown_tx,
        }
    }

    /// Subscribe another task to this set's shutdown signal
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Cancel pending timers and backoff waits, then join the tasks
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
