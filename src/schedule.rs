//! Tariff schedule model and payload parsing
//!
//! Normalizes the upstream tariff payload into an ordered sequence of typed
//! price slots. Validation is strict: a payload that violates the slot
//! invariants is rejected as a whole so the cache only ever holds schedules
//! that satisfy them.

use crate::error::ParseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys under which the upstream payload may carry the slot list
const SLOT_LIST_KEYS: [&str; 3] = ["prices", "data", "slots"];

/// Aliases for a slot's start timestamp, in lookup order
const START_KEYS: [&str; 6] = [
    "start_timestamp",
    "start",
    "start_time",
    "from",
    "timestamp",
    "time",
];

/// Aliases for a slot's end timestamp, in lookup order
const END_KEYS: [&str; 6] = [
    "end_timestamp",
    "end",
    "end_time",
    "to",
    "valid_until",
    "finish",
];

/// Pricing category tracked independently per sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TariffType {
    Electricity,
    Grid,
    Dso,
    Integrated,
    FeedIn,
}

impl TariffType {
    /// Parse the wire/config label; returns `None` for unknown labels
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "electricity" => Some(Self::Electricity),
            "grid" => Some(Self::Grid),
            "dso" => Some(Self::Dso),
            "integrated" => Some(Self::Integrated),
            "feed_in" => Some(Self::FeedIn),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::Grid => "grid",
            Self::Dso => "dso",
            Self::Integrated => "integrated",
            Self::FeedIn => "feed_in",
        }
    }

    /// All known tariff types
    pub fn all() -> &'static [TariffType] {
        &[
            Self::Electricity,
            Self::Grid,
            Self::Dso,
            Self::Integrated,
            Self::FeedIn,
        ]
    }
}

impl std::fmt::Display for TariffType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous time interval with a fixed price in CHF/kWh.
///
/// The end is exclusive: an instant equal to `end` belongs to the next slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub price: f64,
}

impl PriceSlot {
    /// Containment test with exclusive end
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// The full set of slots known for one tariff type at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub tariff_type: TariffType,
    /// Sorted by start, non-overlapping; may legitimately cover only part of
    /// a day, and may be empty near day boundaries
    pub slots: Vec<PriceSlot>,
    pub fetched_at: DateTime<Utc>,
    /// Start of the earliest slot, if any
    pub valid_from: Option<DateTime<Utc>>,
    /// Exclusive end of the latest slot, if any
    pub valid_until: Option<DateTime<Utc>>,
}

impl Schedule {
    /// Slot covering `at`, if the schedule has one
    pub fn slot_at(&self, at: DateTime<Utc>) -> Option<&PriceSlot> {
        self.slots.iter().find(|slot| slot.contains(at))
    }
}

/// Parse and validate an upstream payload into a `Schedule`.
///
/// `window_end` closes the final slot when the payload leaves its end open;
/// `component` selects a price component within a tariff type (the upstream
/// default component is `work`).
pub fn parse_schedule(
    payload: &Value,
    tariff_type: TariffType,
    component: Option<&str>,
    window_end: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
) -> Result<Schedule, ParseError> {
    let raw_slots = find_slot_list(payload)
        .ok_or_else(|| ParseError::envelope("none of prices/data/slots is a list"))?;

    // Starts are resolved for all slots first so a missing end can borrow the
    // next slot's start.
    let starts: Vec<Option<DateTime<Utc>>> = raw_slots
        .iter()
        .map(|slot| first_value(slot, &START_KEYS).and_then(coerce_datetime))
        .collect();

    let mut slots = Vec::with_capacity(raw_slots.len());
    for (index, raw) in raw_slots.iter().enumerate() {
        let start = starts[index]
            .ok_or_else(|| ParseError::slot(index, "missing or unparsable start timestamp"))?;

        let end = match first_value(raw, &END_KEYS).and_then(coerce_datetime) {
            Some(end) => end,
            None => starts[index + 1..]
                .iter()
                .flatten()
                .next()
                .copied()
                .unwrap_or(window_end),
        };

        if start >= end {
            return Err(ParseError::slot(
                index,
                format!("start {} is not before end {}", start, end),
            ));
        }

        let price = extract_slot_price(raw, tariff_type, component)
            .ok_or_else(|| ParseError::slot(index, "no usable price value"))?;
        if !price.is_finite() || price < 0.0 {
            return Err(ParseError::slot(index, format!("invalid price {}", price)));
        }

        slots.push(PriceSlot { start, end, price });
    }

    slots.sort_by_key(|slot| slot.start);
    for index in 1..slots.len() {
        if slots[index].start < slots[index - 1].end {
            return Err(ParseError::Overlap { index });
        }
    }

    let valid_from = slots.first().map(|slot| slot.start);
    let valid_until = slots.last().map(|slot| slot.end);
    Ok(Schedule {
        tariff_type,
        slots,
        fetched_at,
        valid_from,
        valid_until,
    })
}

fn find_slot_list(payload: &Value) -> Option<&Vec<Value>> {
    SLOT_LIST_KEYS
        .iter()
        .find_map(|key| payload.get(key).and_then(Value::as_array))
}

fn first_value<'a>(slot: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| slot.get(key).filter(|v| !v.is_null()))
}

/// Accepts RFC 3339 strings and numeric epochs (milliseconds when > 1e12)
fn coerce_datetime(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(s) = value.as_str() {
        return DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }
    if let Some(n) = value.as_f64() {
        let secs = if n > 1_000_000_000_000.0 { n / 1000.0 } else { n };
        return DateTime::from_timestamp(secs as i64, 0);
    }
    None
}

/// Extract the price for a tariff type, preferring CHF/kWh entries.
///
/// Handles the three payload shapes seen upstream: a bare numeric `value`, a
/// per-tariff component list, and a flat `{unit, component, value}` slot.
fn extract_slot_price(slot: &Value, tariff_type: TariffType, component: Option<&str>) -> Option<f64> {
    if component.is_none()
        && let Some(value) = slot.get("value").and_then(Value::as_f64)
    {
        return Some(value);
    }

    if let Some(entries) = slot.get(tariff_type.as_str()).and_then(Value::as_array) {
        let mut fallback = None;
        for entry in entries {
            if let Some(wanted) = component
                && entry.get("component").and_then(Value::as_str) != Some(wanted)
            {
                continue;
            }
            let value = entry.get("value").and_then(Value::as_f64);
            if entry.get("unit").and_then(Value::as_str) == Some("CHF/kWh")
                && let Some(v) = value
            {
                return Some(v);
            }
            if fallback.is_none() {
                fallback = value;
            }
        }
        if fallback.is_some() {
            return fallback;
        }
    }

    if slot.get("unit").and_then(Value::as_str) == Some("CHF/kWh") {
        let slot_component = slot.get("component").and_then(Value::as_str);
        let matches = match component {
            None => slot_component.is_none() || slot_component == Some("work"),
            Some(wanted) => slot_component == Some(wanted),
        };
        if matches {
            return slot.get("value").and_then(Value::as_f64);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, h, m, 0).unwrap()
    }

    fn day_end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap()
    }

    #[test]
    fn tariff_type_labels_round_trip() {
        for t in TariffType::all() {
            assert_eq!(TariffType::from_label(t.as_str()), Some(*t));
        }
        assert_eq!(TariffType::from_label("FEED_IN"), Some(TariffType::FeedIn));
        assert_eq!(TariffType::from_label("water"), None);
    }

    #[test]
    fn parses_plain_value_slots() {
        let payload = json!({"status": "ok", "prices": [
            {"start_timestamp": "2026-03-14T00:00:00Z", "end_timestamp": "2026-03-14T12:00:00Z", "value": 0.10},
            {"start_timestamp": "2026-03-14T12:00:00Z", "end_timestamp": "2026-03-15T00:00:00Z", "value": 0.15},
        ]});
        let schedule = parse_schedule(
            &payload,
            TariffType::Electricity,
            None,
            day_end(),
            utc(6, 0),
        )
        .unwrap();
        assert_eq!(schedule.slots.len(), 2);
        assert_eq!(schedule.slots[0].price, 0.10);
        assert_eq!(schedule.valid_from, Some(utc(0, 0)));
        assert_eq!(schedule.valid_until, Some(day_end()));
    }

    #[test]
    fn accepts_alias_keys_and_epoch_timestamps() {
        // 2026-03-14T00:00:00Z = 1773446400; ms variant for the second slot
        let payload = json!({"slots": [
            {"from": 1773446400, "to": 1773489600, "value": 0.08},
            {"timestamp": 1773489600000u64, "value": 0.09},
        ]});
        let schedule = parse_schedule(
            &payload,
            TariffType::Electricity,
            None,
            day_end(),
            utc(6, 0),
        )
        .unwrap();
        assert_eq!(schedule.slots[0].start, utc(0, 0));
        assert_eq!(schedule.slots[0].end, utc(12, 0));
        // Open end of the final slot closes at the window end
        assert_eq!(schedule.slots[1].end, day_end());
    }

    #[test]
    fn missing_end_borrows_next_start() {
        let payload = json!({"prices": [
            {"start_timestamp": "2026-03-14T00:00:00Z", "value": 0.10},
            {"start_timestamp": "2026-03-14T12:00:00Z", "value": 0.15},
        ]});
        let schedule = parse_schedule(
            &payload,
            TariffType::Electricity,
            None,
            day_end(),
            utc(6, 0),
        )
        .unwrap();
        assert_eq!(schedule.slots[0].end, utc(12, 0));
        assert_eq!(schedule.slots[1].end, day_end());
    }

    #[test]
    fn extracts_component_prices() {
        let payload = json!({"prices": [{
            "start_timestamp": "2026-03-14T00:00:00Z",
            "end_timestamp": "2026-03-14T12:00:00Z",
            "grid": [
                {"component": "work", "unit": "CHF/kWh", "value": 0.05},
                {"component": "power", "unit": "CHF/kW", "value": 4.20},
            ],
        }]});
        let schedule =
            parse_schedule(&payload, TariffType::Grid, None, day_end(), utc(6, 0)).unwrap();
        assert_eq!(schedule.slots[0].price, 0.05);

        let power = parse_schedule(
            &payload,
            TariffType::Grid,
            Some("power"),
            day_end(),
            utc(6, 0),
        )
        .unwrap();
        assert_eq!(power.slots[0].price, 4.20);
    }

    #[test]
    fn unsorted_input_is_sorted() {
        let payload = json!({"prices": [
            {"start_timestamp": "2026-03-14T12:00:00Z", "end_timestamp": "2026-03-15T00:00:00Z", "value": 0.15},
            {"start_timestamp": "2026-03-14T00:00:00Z", "end_timestamp": "2026-03-14T12:00:00Z", "value": 0.10},
        ]});
        let schedule = parse_schedule(
            &payload,
            TariffType::Electricity,
            None,
            day_end(),
            utc(6, 0),
        )
        .unwrap();
        assert_eq!(schedule.slots[0].price, 0.10);
        assert_eq!(schedule.slots[1].price, 0.15);
    }

    #[test]
    fn overlapping_slots_are_rejected() {
        let payload = json!({"prices": [
            {"start_timestamp": "2026-03-14T00:00:00Z", "end_timestamp": "2026-03-14T13:00:00Z", "value": 0.10},
            {"start_timestamp": "2026-03-14T12:00:00Z", "end_timestamp": "2026-03-15T00:00:00Z", "value": 0.15},
        ]});
        let err = parse_schedule(
            &payload,
            TariffType::Electricity,
            None,
            day_end(),
            utc(6, 0),
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Overlap { index: 1 }));
    }

    #[test]
    fn inverted_and_negative_slots_are_rejected() {
        let inverted = json!({"prices": [
            {"start_timestamp": "2026-03-14T12:00:00Z", "end_timestamp": "2026-03-14T00:00:00Z", "value": 0.10},
        ]});
        assert!(matches!(
            parse_schedule(&inverted, TariffType::Electricity, None, day_end(), utc(6, 0)),
            Err(ParseError::Slot { index: 0, .. })
        ));

        let negative = json!({"prices": [
            {"start_timestamp": "2026-03-14T00:00:00Z", "end_timestamp": "2026-03-14T12:00:00Z", "value": -0.01},
        ]});
        assert!(matches!(
            parse_schedule(&negative, TariffType::Electricity, None, day_end(), utc(6, 0)),
            Err(ParseError::Slot { index: 0, .. })
        ));
    }

    #[test]
    fn slot_without_price_is_an_error_not_a_drop() {
        let payload = json!({"prices": [
            {"start_timestamp": "2026-03-14T00:00:00Z", "end_timestamp": "2026-03-14T12:00:00Z", "value": 0.10},
            {"start_timestamp": "2026-03-14T12:00:00Z", "end_timestamp": "2026-03-15T00:00:00Z"},
        ]});
        assert!(matches!(
            parse_schedule(&payload, TariffType::Electricity, None, day_end(), utc(6, 0)),
            Err(ParseError::Slot { index: 1, .. })
        ));
    }

    #[test]
    fn missing_slot_list_is_an_envelope_error() {
        let payload = json!({"status": "ok", "message": "no prices here"});
        assert!(matches!(
            parse_schedule(&payload, TariffType::Electricity, None, day_end(), utc(6, 0)),
            Err(ParseError::Envelope { .. })
        ));
    }

    #[test]
    fn empty_slot_list_is_a_valid_gap_only_schedule() {
        let payload = json!({"prices": []});
        let schedule = parse_schedule(
            &payload,
            TariffType::Electricity,
            None,
            day_end(),
            utc(6, 0),
        )
        .unwrap();
        assert!(schedule.slots.is_empty());
        assert_eq!(schedule.valid_from, None);
        assert!(schedule.slot_at(utc(8, 0)).is_none());
    }

    #[test]
    fn exclusive_end_boundary() {
        let payload = json!({"prices": [
            {"start_timestamp": "2026-03-14T00:00:00Z", "end_timestamp": "2026-03-14T12:00:00Z", "value": 0.10},
            {"start_timestamp": "2026-03-14T12:00:00Z", "end_timestamp": "2026-03-15T00:00:00Z", "value": 0.15},
        ]});
        let schedule = parse_schedule(
            &payload,
            TariffType::Electricity,
            None,
            day_end(),
            utc(6, 0),
        )
        .unwrap();
        assert_eq!(schedule.slot_at(utc(11, 59)).unwrap().price, 0.10);
        assert_eq!(schedule.slot_at(utc(12, 0)).unwrap().price, 0.15);
    }
}
