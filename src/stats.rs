//! Derived statistics over a tariff schedule window
//!
//! Pure helpers used for sensor attributes. All arithmetic treats slot ends
//! as exclusive, and all results are forward-looking over the cached window
//! only.

use crate::schedule::PriceSlot;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use chrono_tz::Tz;

/// Start and exclusive end of the local day `offset_days` from `now`
pub fn day_bounds(tz: Tz, now: DateTime<Utc>, offset_days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_date = now.with_timezone(&tz).date_naive() + Duration::days(offset_days);
    let start = local_day_start(tz, local_date);
    let end = local_day_start(tz, local_date + Duration::days(1));
    (start, end)
}

fn local_day_start(tz: Tz, date: chrono::NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    tz.from_local_datetime(&midnight)
        .earliest()
        .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
}

/// Time-weighted average price over `[start, end)`, or `None` if no slot
/// overlaps the window
pub fn average_price_for_window(
    slots: &[PriceSlot],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Option<f64> {
    let mut total_seconds = 0.0;
    let mut weighted_sum = 0.0;
    for slot in slots {
        let overlap_start = slot.start.max(start);
        let overlap_end = slot.end.min(end);
        if overlap_start >= overlap_end {
            continue;
        }
        let seconds = (overlap_end - overlap_start).num_seconds() as f64;
        weighted_sum += slot.price * seconds;
        total_seconds += seconds;
    }
    if total_seconds == 0.0 {
        return None;
    }
    Some(weighted_sum / total_seconds)
}

/// Which end of the price range a window search looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
}

/// A consecutive window of slots with its time-weighted average price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStat {
    pub average: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Cheapest or most expensive run of contiguous slots spanning exactly
/// `window_hours`, among slots starting within `[start, end)`
pub fn window_extreme(
    slots: &[PriceSlot],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    window_hours: u32,
    extreme: Extreme,
) -> Option<WindowStat> {
    if window_hours == 0 {
        return None;
    }
    let target_seconds = i64::from(window_hours) * 3600;
    let day_slots: Vec<&PriceSlot> = slots
        .iter()
        .filter(|slot| start <= slot.start && slot.start < end)
        .collect();

    let mut best: Option<WindowStat> = None;
    for i in 0..day_slots.len() {
        let mut seconds = 0i64;
        let mut weighted = 0.0;
        let mut j = i;
        while j < day_slots.len() && seconds < target_seconds {
            if j > i && day_slots[j].start != day_slots[j - 1].end {
                break;
            }
            let d = (day_slots[j].end - day_slots[j].start).num_seconds();
            seconds += d;
            weighted += day_slots[j].price * d as f64;
            j += 1;
        }
        if seconds != target_seconds {
            continue;
        }
        let candidate = WindowStat {
            average: weighted / seconds as f64,
            start: day_slots[i].start,
            end: day_slots[j - 1].end,
        };
        let better = match (&best, extreme) {
            (None, _) => true,
            (Some(b), Extreme::Min) => candidate.average < b.average,
            (Some(b), Extreme::Max) => candidate.average > b.average,
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

/// Threshold price delimiting the cheapest (or most expensive) `fraction`
/// of the given values
pub fn percentile_threshold(values: &[f64], fraction: f64, highest: bool) -> Option<f64> {
    if values.is_empty() || fraction <= 0.0 {
        return None;
    }
    let count = ((values.len() as f64 * fraction).round() as usize).max(1);
    let count = count.min(values.len());
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if highest {
        sorted.get(sorted.len().saturating_sub(count)).copied()
    } else {
        sorted.get(count - 1).copied()
    }
}

/// Instant at which the price next changes: the exclusive end of the slot
/// covering `now`, or the start of the next known slot during a gap
pub fn next_change(slots: &[PriceSlot], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(current) = slots.iter().find(|slot| slot.contains(now)) {
        return Some(current.end);
    }
    slots
        .iter()
        .map(|slot| slot.start)
        .filter(|start| *start > now)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap()
    }

    fn slot(start: DateTime<Utc>, end: DateTime<Utc>, price: f64) -> PriceSlot {
        PriceSlot { start, end, price }
    }

    fn hourly(day: u32, from: u32, prices: &[f64]) -> Vec<PriceSlot> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| slot(utc(day, from + i as u32), utc(day, from + i as u32 + 1), *p))
            .collect()
    }

    #[test]
    fn day_bounds_follow_local_midnight() {
        let tz: Tz = "Europe/Zurich".parse().unwrap();
        // 2026-03-14T23:30Z is already 00:30 local on the 15th (CET, +01:00)
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 23, 30, 0).unwrap();
        let (start, end) = day_bounds(tz, now, 0);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 14, 23, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 15, 23, 0, 0).unwrap());
    }

    #[test]
    fn weighted_average_respects_partial_overlap() {
        let slots = vec![
            slot(utc(14, 0), utc(14, 12), 0.10),
            slot(utc(14, 12), utc(15, 0), 0.20),
        ];
        // Full day: 12h at 0.10 and 12h at 0.20
        let avg = average_price_for_window(&slots, utc(14, 0), utc(15, 0)).unwrap();
        assert!((avg - 0.15).abs() < 1e-9);

        // Window 06:00-18:00: 6h at 0.10, 6h at 0.20
        let avg = average_price_for_window(&slots, utc(14, 6), utc(14, 18)).unwrap();
        assert!((avg - 0.15).abs() < 1e-9);

        assert!(average_price_for_window(&slots, utc(16, 0), utc(17, 0)).is_none());
    }

    #[test]
    fn window_extreme_finds_cheapest_run() {
        let slots = hourly(14, 0, &[0.30, 0.10, 0.12, 0.40, 0.05, 0.06]);
        let best = window_extreme(&slots, utc(14, 0), utc(15, 0), 2, Extreme::Min).unwrap();
        assert_eq!(best.start, utc(14, 4));
        assert_eq!(best.end, utc(14, 6));
        assert!((best.average - 0.055).abs() < 1e-9);

        let worst = window_extreme(&slots, utc(14, 0), utc(15, 0), 2, Extreme::Max).unwrap();
        assert_eq!(worst.start, utc(14, 2));
        assert!((worst.average - 0.26).abs() < 1e-9);
    }

    #[test]
    fn window_extreme_skips_non_contiguous_runs() {
        let mut slots = hourly(14, 0, &[0.10, 0.10]);
        slots.extend(hourly(14, 5, &[0.01, 0.30]));
        // The cheap pair at 05:00 is split from the earlier run; a 3h window
        // cannot be formed anywhere
        assert!(window_extreme(&slots, utc(14, 0), utc(15, 0), 3, Extreme::Min).is_none());
        // But 2h windows exist inside each contiguous run
        let best = window_extreme(&slots, utc(14, 0), utc(15, 0), 2, Extreme::Min).unwrap();
        assert_eq!(best.start, utc(14, 5));
    }

    #[test]
    fn percentile_threshold_matches_rank() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile_threshold(&values, 0.25, false), Some(1.0));
        assert_eq!(percentile_threshold(&values, 0.5, false), Some(2.0));
        assert_eq!(percentile_threshold(&values, 0.25, true), Some(4.0));
        assert_eq!(percentile_threshold(&values, 0.0, false), None);
        assert_eq!(percentile_threshold(&[], 0.5, false), None);
    }

    #[test]
    fn next_change_handles_slots_and_gaps() {
        let slots = vec![
            slot(utc(14, 0), utc(14, 6), 0.10),
            slot(utc(14, 8), utc(14, 12), 0.20),
        ];
        assert_eq!(next_change(&slots, utc(14, 3)), Some(utc(14, 6)));
        // In the gap, the next known slot start is the next change
        assert_eq!(next_change(&slots, utc(14, 7)), Some(utc(14, 8)));
        assert_eq!(next_change(&slots, utc(14, 13)), None);
    }
}
