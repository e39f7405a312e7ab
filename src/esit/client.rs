use crate::config::{ApiConfig, AuthMethod};
use crate::error::{FetchError, ObolusError, Result};
use crate::esit::types::ensure_ok;
use crate::esit::ScheduleSource;
use crate::schedule::TariffType;
use crate::logging::get_logger;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use serde_json::Value;

/// HTTP client for the tariff pricing service
pub struct EsitClient {
    http: reqwest::Client,
    base_url: String,
    method: AuthMethod,
    metering_code: Option<String>,
    token: Option<String>,
    tariff_name: Option<String>,
    logger: crate::logging::StructuredLogger,
}

impl EsitClient {
    /// Build a client from the API configuration.
    ///
    /// The request timeout is applied at the client level so a single slow
    /// call cannot stall a poll cycle.
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(api.timeout_seconds))
            .user_agent(concat!("obolus/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ObolusError::network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            method: api.method,
            metering_code: api.metering_code.clone(),
            token: api.token.clone(),
            tariff_name: api.tariff_name.clone(),
            logger: get_logger("esit"),
        })
    }

    /// Endpoint path for the configured credential mode
    fn endpoint(&self) -> &'static str {
        match self.method {
            AuthMethod::MeteringCode => "metering_code",
            AuthMethod::TariffName => "tariff_name",
        }
    }

    /// Query parameters for one fetch
    fn query(
        &self,
        tariff_type: TariffType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("tariff_type", tariff_type.as_str().to_string()),
            ("start_timestamp", start.to_rfc3339()),
            ("end_timestamp", end.to_rfc3339()),
        ];
        match self.method {
            AuthMethod::MeteringCode => {
                params.push((
                    "metering_code",
                    self.metering_code.clone().unwrap_or_default(),
                ));
            }
            AuthMethod::TariffName => {
                params.push(("tariff_name", self.tariff_name.clone().unwrap_or_default()));
            }
        }
        params
    }
}

#[async_trait]
impl ScheduleSource for EsitClient {
    async fn fetch(
        &self,
        tariff_type: TariffType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<Value, FetchError> {
        let url = format!("{}/{}", self.base_url, self.endpoint());
        let mut request = self.http.get(&url).query(&self.query(tariff_type, start, end));

        if self.method == AuthMethod::MeteringCode
            && let Some(token) = self.token.as_deref().filter(|t| !t.trim().is_empty())
        {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.trim()));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            self.logger.warn(&format!(
                "Tariff API returned {} for {}: {}",
                status,
                tariff_type,
                body.chars().take(200).collect::<String>()
            ));
            return Err(FetchError::from_status(
                status,
                format!("{} from {}", status, url),
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| FetchError::malformed(format!("undecodable body: {}", e)))?;
        ensure_ok(&payload)?;
        Ok(payload)
    }
}
