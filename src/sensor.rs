//! Sensor adapter
//!
//! Renders cache state into the per-tariff-type sensor format consumed by
//! the host platform: the current price as the primary reading plus the full
//! slot list and derived statistics as attributes. Read-only against the
//! cache — reporting never triggers fetches.

use crate::cache::TariffCache;
use crate::config::Config;
use crate::error::{FetchFault, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::schedule::{PriceSlot, TariffType};
use crate::stats::{Extreme, WindowStat, average_price_for_window, day_bounds, next_change, window_extreme};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior, interval};

/// Reported unit for all price sensors
pub const PRICE_UNIT: &str = "CHF/kWh";

/// Cheapest/most expensive contiguous window of a given length
#[derive(Debug, Clone, Serialize)]
pub struct WindowAttr {
    pub hours: u32,
    pub cheapest: Option<WindowStat>,
    pub most_expensive: Option<WindowStat>,
}

/// Supplementary sensor attributes
#[derive(Debug, Clone, Serialize)]
pub struct SensorAttributes {
    /// Full ordered slot list as fetched
    pub prices: Vec<PriceSlot>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Last refresh failure kind; persistent auth/not-found faults show up
    /// here so misconfiguration is diagnosable
    pub fault: Option<FetchFault>,
    pub stale: bool,
    pub next_change: Option<DateTime<Utc>>,
    pub average_today: Option<f64>,
    pub average_tomorrow: Option<f64>,
    pub windows: Vec<WindowAttr>,
}

/// One tariff type's state as reported to the host platform
#[derive(Debug, Clone, Serialize)]
pub struct SensorState {
    pub tariff_type: TariffType,
    /// Current price, or `None` when no slot covers the present instant
    pub value: Option<f64>,
    pub unit: &'static str,
    pub attributes: SensorAttributes,
}

impl SensorState {
    pub fn available(&self) -> bool {
        self.value.is_some()
    }
}

/// Build the sensor state for one tariff type at `now`
pub fn build_state(
    cache: &TariffCache,
    config: &Config,
    tz: Tz,
    tariff_type: TariffType,
    now: DateTime<Utc>,
) -> SensorState {
    let snapshot = cache.snapshot(tariff_type);
    let slots: Vec<PriceSlot> = snapshot
        .as_ref()
        .and_then(|s| s.schedule.as_ref())
        .map(|schedule| schedule.slots.clone())
        .unwrap_or_default();

    let value = cache.current_price(tariff_type, now).map(|slot| slot.price);
    let max_age = ChronoDuration::minutes(config.polling.max_age_minutes as i64);

    let (today_start, today_end) = day_bounds(tz, now, 0);
    let (tomorrow_start, tomorrow_end) = day_bounds(tz, now, 1);

    let windows = config
        .sensor
        .stat_window_hours
        .iter()
        .map(|hours| WindowAttr {
            hours: *hours,
            cheapest: window_extreme(&slots, today_start, today_end, *hours, Extreme::Min),
            most_expensive: window_extreme(&slots, today_start, today_end, *hours, Extreme::Max),
        })
        .collect();

    let attributes = SensorAttributes {
        next_change: next_change(&slots, now),
        average_today: average_price_for_window(&slots, today_start, today_end),
        average_tomorrow: average_price_for_window(&slots, tomorrow_start, tomorrow_end),
        windows,
        fetched_at: snapshot.as_ref().and_then(|s| s.last_successful_fetch),
        last_attempt: snapshot.as_ref().and_then(|s| s.last_attempt),
        consecutive_failures: snapshot.as_ref().map_or(0, |s| s.consecutive_failures),
        fault: snapshot.as_ref().and_then(|s| s.fault),
        stale: cache.is_stale(tariff_type, now, max_age),
        prices: slots,
    };

    SensorState {
        tariff_type,
        value,
        unit: PRICE_UNIT,
        attributes,
    }
}

/// Destination for rendered sensor states (the host platform boundary)
#[async_trait]
pub trait StateSink: Send + Sync {
    async fn publish(&self, state: &SensorState) -> Result<()>;
}

/// Default sink: logs each state as a JSON line
pub struct LogSink {
    logger: StructuredLogger,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            logger: get_logger("sensor"),
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateSink for LogSink {
    async fn publish(&self, state: &SensorState) -> Result<()> {
        let rendered = serde_json::to_string(state)?;
        self.logger.info(&rendered);
        Ok(())
    }
}

/// Periodic reporter publishing every configured tariff type on its own
/// cadence, independent of poll timing
pub struct SensorReporter {
    cache: Arc<TariffCache>,
    config: Config,
    tz: Tz,
    sink: Arc<dyn StateSink>,
    logger: StructuredLogger,
}

impl SensorReporter {
    pub fn new(cache: Arc<TariffCache>, config: Config, tz: Tz, sink: Arc<dyn StateSink>) -> Self {
        Self {
            cache,
            config,
            tz,
            sink,
            logger: get_logger("sensor"),
        }
    }

    /// Publish one reporting tick for all configured tariff types
    pub async fn report_once(&self, now: DateTime<Utc>) {
        for tariff_type in &self.config.tariffs.types {
            let state = build_state(&self.cache, &self.config, self.tz, *tariff_type, now);
            if let Err(e) = self.sink.publish(&state).await {
                self.logger
                    .warn(&format!("Failed to publish {} state: {}", tariff_type, e));
            }
        }
    }

    /// Report on the configured interval until shutdown
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(
            self.config.sensor.report_interval_seconds,
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            self.report_once(Utc::now()).await;
        }
        self.logger.debug("Sensor reporter stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::schedule::Schedule;
    use chrono::TimeZone;

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, h, m, 0).unwrap()
    }

    fn test_config() -> Config {
        Config {
            api: ApiConfig {
                tariff_name: Some("vario_plus".to_string()),
                ..ApiConfig::default()
            },
            ..Config::default()
        }
    }

    fn populated_cache() -> TariffCache {
        let cache = TariffCache::new(&[TariffType::Electricity, TariffType::Grid]);
        let midnight = utc(0, 0);
        let noon = utc(12, 0);
        let next_midnight = Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        cache.refresh(
            TariffType::Electricity,
            Schedule {
                tariff_type: TariffType::Electricity,
                slots: vec![
                    PriceSlot {
                        start: midnight,
                        end: noon,
                        price: 0.10,
                    },
                    PriceSlot {
                        start: noon,
                        end: next_midnight,
                        price: 0.15,
                    },
                ],
                fetched_at: utc(6, 0),
                valid_from: Some(midnight),
                valid_until: Some(next_midnight),
            },
        );
        cache
    }

    #[test]
    fn state_carries_value_and_slot_attributes() {
        let cache = populated_cache();
        let state = build_state(
            &cache,
            &test_config(),
            chrono_tz::UTC,
            TariffType::Electricity,
            utc(9, 0),
        );

        assert_eq!(state.value, Some(0.10));
        assert_eq!(state.unit, "CHF/kWh");
        assert!(state.available());
        assert_eq!(state.attributes.prices.len(), 2);
        assert_eq!(state.attributes.next_change, Some(utc(12, 0)));
        let avg = state.attributes.average_today.unwrap();
        assert!((avg - 0.125).abs() < 1e-9);
        assert!(!state.attributes.stale);
        assert!(state.attributes.fault.is_none());
    }

    #[test]
    fn unfetched_type_reports_unavailable_not_error() {
        let cache = populated_cache();
        let state = build_state(
            &cache,
            &test_config(),
            chrono_tz::UTC,
            TariffType::Grid,
            utc(9, 0),
        );

        assert_eq!(state.value, None);
        assert!(!state.available());
        assert!(state.attributes.prices.is_empty());
        assert!(state.attributes.stale);
    }

    #[test]
    fn persistent_fault_is_visible_in_attributes() {
        let cache = populated_cache();
        cache.record_failure(TariffType::Grid, FetchFault::Unauthorized, utc(7, 0));
        let state = build_state(
            &cache,
            &test_config(),
            chrono_tz::UTC,
            TariffType::Grid,
            utc(9, 0),
        );

        assert_eq!(state.attributes.fault, Some(FetchFault::Unauthorized));
        assert_eq!(state.attributes.consecutive_failures, 1);
    }

    #[test]
    fn state_serializes_with_expected_shape() {
        let cache = populated_cache();
        let state = build_state(
            &cache,
            &test_config(),
            chrono_tz::UTC,
            TariffType::Electricity,
            utc(9, 0),
        );
        let json = serde_json::to_value(&state).unwrap();

        assert_eq!(json["tariff_type"], "electricity");
        assert_eq!(json["unit"], "CHF/kWh");
        assert_eq!(json["value"], 0.10);
        assert!(json["attributes"]["prices"].as_array().unwrap().len() == 2);
        assert!(json["attributes"]["windows"].as_array().is_some());
    }
}
