//! Date-ranged telemetry queries
//!
//! Temperature and water-detection readings are passed through as typed
//! records; nothing here transforms or caches them.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{join_url, RegistryConfig, TelemetryConfig};
use crate::io::HttpClient;
use crate::CatalogError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> crate::Result<Self> {
        if start > end {
            return Err(CatalogError::InvalidDateRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds
    pub fn parse(start: &str, end: &str) -> crate::Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// A range covering only the current local day
    pub fn today() -> Self {
        let today = Local::now().date_naive();
        Self {
            start: today,
            end: today,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::today()
    }
}

fn parse_date(value: &str) -> crate::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| {
        CatalogError::InvalidDateRange(format!("'{}' is not a YYYY-MM-DD date: {}", value, e))
    })
}

/// Query parameters for a telemetry request
pub fn query_params(range: &DateRange, device_id: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("start_date", range.start.format(DATE_FORMAT).to_string()),
        ("end_date", range.end.format(DATE_FORMAT).to_string()),
    ];
    if let Some(device_id) = device_id.filter(|id| !id.is_empty()) {
        params.push(("device_id", device_id.to_string()));
    }
    params
}

/// One temperature sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    /// `YYYY-MM-DD HH:MM:SS`
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    #[serde(rename = "DeviceID")]
    pub device_id: String,
}

/// One water-detection sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterReading {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "DeviceID")]
    pub device_id: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "WaterDetected")]
    pub water_detected: bool,
}

#[derive(Deserialize)]
struct ResultEnvelope<T> {
    result: Vec<T>,
}

/// Client for the temperature and water telemetry endpoints
pub struct TelemetryClient {
    temperature_url: String,
    water_url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("temperature_url", &self.temperature_url)
            .field("water_url", &self.water_url)
            .finish()
    }
}

impl TelemetryClient {
    pub fn new(
        registry: &RegistryConfig,
        telemetry: &TelemetryConfig,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            temperature_url: join_url(&registry.base_url, &telemetry.temperature_path),
            water_url: join_url(&registry.base_url, &telemetry.water_path),
            http,
        }
    }

    pub async fn fetch_temperature(
        &self,
        range: &DateRange,
        device_id: Option<&str>,
    ) -> crate::Result<Vec<TemperatureReading>> {
        self.fetch(&self.temperature_url, range, device_id).await
    }

    pub async fn fetch_water(
        &self,
        range: &DateRange,
        device_id: Option<&str>,
    ) -> crate::Result<Vec<WaterReading>> {
        self.fetch(&self.water_url, range, device_id).await
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        range: &DateRange,
        device_id: Option<&str>,
    ) -> crate::Result<Vec<T>> {
        let params = query_params(range, device_id);
        let borrowed: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let response = self
            .http
            .get_with_query(url, &borrowed)
            .await?
            .error_for_status(url)?;

        let envelope: ResultEnvelope<T> = serde_json::from_str(&response.body).map_err(|e| {
            CatalogError::MalformedResponse(format!("Telemetry from {}: {}", url, e))
        })?;
        tracing::debug!("{} returned {} readings", url, envelope.result.len());
        Ok(envelope.result)
    }
}
