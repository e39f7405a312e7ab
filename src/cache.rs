//! Per-tariff-type schedule cache
//!
//! One writer (the poll scheduler) races arbitrarily many readers (sensor
//! adapter, web surface). Refreshes replace the schedule wholesale via an
//! `Arc` swap under a short-lived lock, so a reader always observes either
//! the previous or the new schedule in full — never a mix.

use crate::error::FetchFault;
use crate::logging::{StructuredLogger, get_logger};
use crate::schedule::{PriceSlot, Schedule, TariffType};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Bookkeeping for one tariff type
#[derive(Debug, Default)]
struct CacheEntry {
    schedule: Option<Arc<Schedule>>,
    last_successful_fetch: Option<DateTime<Utc>>,
    last_attempt: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    fault: Option<FetchFault>,
}

/// Read-only view of a cache entry for reporting
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub tariff_type: TariffType,
    pub schedule: Option<Arc<Schedule>>,
    pub last_successful_fetch: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub fault: Option<FetchFault>,
}

/// Cache of the most recent parsed schedule per configured tariff type
pub struct TariffCache {
    entries: RwLock<HashMap<TariffType, CacheEntry>>,
    logger: StructuredLogger,
}

impl TariffCache {
    /// Create a cache with one entry per configured tariff type
    pub fn new(types: &[TariffType]) -> Self {
        let entries = types
            .iter()
            .map(|t| (*t, CacheEntry::default()))
            .collect::<HashMap<_, _>>();
        Self {
            entries: RwLock::new(entries),
            logger: get_logger("cache"),
        }
    }

    /// Configured tariff types, in no particular order
    pub fn tariff_types(&self) -> Vec<TariffType> {
        match self.entries.read() {
            Ok(entries) => entries.keys().copied().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Replace the schedule for a tariff type and reset failure bookkeeping
    pub fn refresh(&self, tariff_type: TariffType, schedule: Schedule) {
        let fetched_at = schedule.fetched_at;
        let schedule = Arc::new(schedule);
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        let entry = entries.entry(tariff_type).or_default();
        entry.schedule = Some(schedule);
        entry.last_successful_fetch = Some(fetched_at);
        entry.last_attempt = Some(fetched_at);
        entry.consecutive_failures = 0;
        entry.fault = None;
    }

    /// Record a failed refresh attempt; the cached schedule stays serveable
    pub fn record_failure(&self, tariff_type: TariffType, fault: FetchFault, at: DateTime<Utc>) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        let entry = entries.entry(tariff_type).or_default();
        entry.last_attempt = Some(at);
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        entry.fault = Some(fault);
    }

    /// Slot covering `at` for a tariff type.
    ///
    /// `None` means no data is available — a gap in the schedule or a type
    /// that has never been fetched. That is a normal outcome, not an error;
    /// the cache never fabricates a price.
    pub fn current_price(&self, tariff_type: TariffType, at: DateTime<Utc>) -> Option<PriceSlot> {
        let Ok(entries) = self.entries.read() else {
            return None;
        };
        let schedule = entries.get(&tariff_type)?.schedule.as_ref()?;

        let mut matches = schedule.slots.iter().filter(|slot| slot.contains(at));
        let first = matches.next()?;
        if matches.next().is_some() {
            // Should be unreachable given the parser's non-overlap invariant
            self.logger.warn(&format!(
                "Duplicate slot containment for {} at {}; keeping the first in sorted order",
                tariff_type, at
            ));
        }
        Some(first.clone())
    }

    /// Whether the cached schedule is older than `max_age`.
    ///
    /// Freshness only: a stale schedule is still served by `current_price`.
    /// A type with no successful fetch yet is always stale.
    pub fn is_stale(&self, tariff_type: TariffType, now: DateTime<Utc>, max_age: Duration) -> bool {
        let Ok(entries) = self.entries.read() else {
            return true;
        };
        match entries.get(&tariff_type).and_then(|e| e.last_successful_fetch) {
            Some(fetched) => now - fetched > max_age,
            None => true,
        }
    }

    /// Full view of one entry for the sensor adapter and web surface
    pub fn snapshot(&self, tariff_type: TariffType) -> Option<EntrySnapshot> {
        let Ok(entries) = self.entries.read() else {
            return None;
        };
        let entry = entries.get(&tariff_type)?;
        Some(EntrySnapshot {
            tariff_type,
            schedule: entry.schedule.clone(),
            last_successful_fetch: entry.last_successful_fetch,
            last_attempt: entry.last_attempt,
            consecutive_failures: entry.consecutive_failures,
            fault: entry.fault,
        })
    }
}
