//! # Obolus - Dynamic Electricity Tariff Engine
//!
//! A Rust service that periodically retrieves dynamic electricity tariff
//! schedules from a pricing API and exposes the currently applicable price
//! per tariff type as sensor state.
//!
//! ## Features
//!
//! - **Async-first**: Tokio runtime with one independent poller per tariff
//!   type
//! - **Resilient**: typed failure taxonomy with exponential backoff; one
//!   tariff type's failure never affects the others
//! - **Consistent reads**: schedules are replaced atomically, so price
//!   queries never observe a half-updated schedule
//! - **Diagnosable**: persistent auth/not-found faults surface as sensor
//!   attributes instead of crashing the service
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of
//! concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `esit`: HTTP client for the tariff pricing API
//! - `schedule`: Tariff schedule model and payload parsing
//! - `cache`: Per-tariff-type schedule cache
//! - `poller`: Poll scheduling with retry and backoff
//! - `sensor`: Sensor state rendering and publication
//! - `stats`: Derived statistics over schedule windows
//! - `web`: HTTP state surface

pub mod cache;
pub mod config;
pub mod error;
pub mod esit;
pub mod logging;
pub mod poller;
pub mod schedule;
pub mod sensor;
pub mod stats;
pub mod web;


// Re-export commonly used types
pub use cache::TariffCache;
pub use config::Config;
pub use error::{ObolusError, Result};
pub use schedule::{PriceSlot, Schedule, TariffType};
