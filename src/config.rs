//! Configuration management for Obolus
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{ObolusError, Result};
use crate::schedule::TariffType;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Tariff API connection and credentials
    pub api: ApiConfig,

    /// Tariff type selection
    pub tariffs: TariffsConfig,

    /// Poll scheduling and retry behaviour
    pub polling: PollingConfig,

    /// Sensor reporting configuration
    pub sensor: SensorConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Timezone for day-window computation
    pub timezone: String,
}

/// Credential mode for the tariff API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Authenticated access via metering code and bearer token
    MeteringCode,
    /// Anonymous access via a published tariff name
    TariffName,
}

/// Tariff API connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the pricing service
    pub base_url: String,

    /// Credential mode; exactly one of the two credential sets must be filled
    pub method: AuthMethod,

    /// Metering code for authenticated access
    pub metering_code: Option<String>,

    /// Bearer token for authenticated access
    pub token: Option<String>,

    /// Tariff name for anonymous access
    pub tariff_name: Option<String>,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Tariff type selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TariffsConfig {
    /// Tariff types to poll and expose as sensors
    pub types: Vec<TariffType>,

    /// Optional price component filter (upstream default is `work`)
    pub component: Option<String>,
}

/// Poll scheduling and retry behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Regular update interval in minutes
    pub update_interval_minutes: u64,

    /// First backoff delay after a transient failure, in seconds
    pub backoff_base_seconds: u64,

    /// Backoff growth factor per attempt
    pub backoff_multiplier: f64,

    /// Upper bound for a single backoff delay, in seconds
    pub backoff_cap_seconds: u64,

    /// Max fetch attempts within one cycle before waiting for the next tick
    pub max_retries: u32,

    /// Age after which a cached schedule counts as stale, in minutes
    pub max_age_minutes: u64,

    /// Substitute year for the query window, for inspecting published
    /// future tariffs
    pub query_year: Option<i32>,
}

/// Sensor reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Reporting cadence in seconds, independent of poll timing
    pub report_interval_seconds: u64,

    /// Window lengths (hours) for cheapest/most-expensive window attributes
    pub stat_window_hours: Vec<u32>,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Console-specific level override
    pub console_level: Option<String>,

    /// File-specific level override
    pub file_level: Option<String>,

    /// Path to log file (or directory for rolling logs)
    pub file: String,

    /// Number of rolled log files to keep
    pub backup_count: u32,

    /// Whether to log to console
    #[serde(default = "default_true")]
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://esit.code-fabrik.ch/api/v1".to_string(),
            method: AuthMethod::TariffName,
            metering_code: None,
            token: None,
            tariff_name: None,
            timeout_seconds: 20,
        }
    }
}

impl Default for TariffsConfig {
    fn default() -> Self {
        Self {
            types: vec![TariffType::Electricity],
            component: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            update_interval_minutes: 60,
            backoff_base_seconds: 10,
            backoff_multiplier: 2.0,
            backoff_cap_seconds: 300,
            max_retries: 3,
            max_age_minutes: 180,
            query_year: None,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            report_interval_seconds: 60,
            stat_window_hours: vec![2, 4],
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8089,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/obolus.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        if config.timezone.is_empty() {
            config.timezone = "UTC".to_string();
        }
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "obolus_config.yaml",
            "/data/obolus_config.yaml",
            "/etc/obolus/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse the configured timezone
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        if self.timezone.is_empty() {
            return Ok(chrono_tz::UTC);
        }
        self.timezone
            .parse()
            .map_err(|_| ObolusError::validation("timezone", &format!("unknown timezone: {}", self.timezone)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.api.method {
            AuthMethod::MeteringCode => {
                if self.api.metering_code.as_deref().unwrap_or("").is_empty() {
                    return Err(ObolusError::validation(
                        "api.metering_code",
                        "Required for the metering_code method",
                    ));
                }
                if !self.api.tariff_name.as_deref().unwrap_or("").is_empty() {
                    return Err(ObolusError::validation(
                        "api.tariff_name",
                        "Mutually exclusive with the metering_code method",
                    ));
                }
            }
            AuthMethod::TariffName => {
                if self.api.tariff_name.as_deref().unwrap_or("").is_empty() {
                    return Err(ObolusError::validation(
                        "api.tariff_name",
                        "Required for the tariff_name method",
                    ));
                }
                if !self.api.metering_code.as_deref().unwrap_or("").is_empty()
                    || !self.api.token.as_deref().unwrap_or("").is_empty()
                {
                    return Err(ObolusError::validation(
                        "api.metering_code",
                        "Mutually exclusive with the tariff_name method",
                    ));
                }
            }
        }

        if self.api.base_url.is_empty() {
            return Err(ObolusError::validation(
                "api.base_url",
                "Base URL cannot be empty",
            ));
        }

        if self.api.timeout_seconds == 0 {
            return Err(ObolusError::validation(
                "api.timeout_seconds",
                "Must be greater than 0",
            ));
        }

        if self.tariffs.types.is_empty() {
            return Err(ObolusError::validation(
                "tariffs.types",
                "At least one tariff type must be selected",
            ));
        }

        if self.polling.update_interval_minutes == 0 {
            return Err(ObolusError::validation(
                "polling.update_interval_minutes",
                "Must be greater than 0",
            ));
        }

        if self.polling.backoff_multiplier < 1.0 {
            return Err(ObolusError::validation(
                "polling.backoff_multiplier",
                "Must be at least 1.0",
            ));
        }

        if self.polling.max_retries == 0 {
            return Err(ObolusError::validation(
                "polling.max_retries",
                "Must be greater than 0",
            ));
        }

        if self.sensor.report_interval_seconds == 0 {
            return Err(ObolusError::validation(
                "sensor.report_interval_seconds",
                "Must be greater than 0",
            ));
        }

        if self.web.port == 0 {
            return Err(ObolusError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        self.tz()?;

        Ok(())
    }
}
