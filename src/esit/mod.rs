//! Tariff API integration for dynamic electricity pricing
//!
//! The poll scheduler fetches through the [`ScheduleSource`] trait so tests
//! can substitute a scripted source for the real HTTP client.

pub mod client;
pub mod types;

pub use client::EsitClient;

use crate::error::FetchError;
use crate::schedule::TariffType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Source of raw tariff-schedule payloads for a query window
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Fetch the raw payload for one tariff type over `[start, end)`
    async fn fetch(
        &self,
        tariff_type: TariffType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<Value, FetchError>;
}
