//! Device registry client
//!
//! Lists the devices provisioned on the network server and normalizes each
//! entry into a [`DeviceRecord`]. One HTTP attempt per call, no retries.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::DeviceRecord;
use crate::config::RegistryConfig;
use crate::io::HttpClient;
use crate::CatalogError;

/// Device entry as listed by the registry
#[derive(Debug, Deserialize)]
struct RegistryDevice {
    name: String,
    device_profile_name: String,
    dev_eui: String,
}

impl From<RegistryDevice> for DeviceRecord {
    fn from(device: RegistryDevice) -> Self {
        DeviceRecord {
            name: device.name,
            device_type: device.device_profile_name,
            identifier: device.dev_eui,
        }
    }
}

/// Source of the flat device list
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait DeviceRegistry: Send + Sync {
    /// Fetch every registered device, in registry order
    async fn fetch_devices(&self) -> crate::Result<Vec<DeviceRecord>>;
}

/// HTTP client for the registry's device listing endpoint
pub struct RegistryClient {
    devices_url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("devices_url", &self.devices_url)
            .finish()
    }
}

impl RegistryClient {
    pub fn new(config: &RegistryConfig, http: Arc<dyn HttpClient>) -> Self {
        let devices_url = config.devices_url();
        tracing::debug!("Created RegistryClient for {}", devices_url);
        Self { devices_url, http }
    }

    pub fn devices_url(&self) -> &str {
        &self.devices_url
    }
}

#[async_trait]
impl DeviceRegistry for RegistryClient {
    async fn fetch_devices(&self) -> crate::Result<Vec<DeviceRecord>> {
        tracing::debug!("Fetching devices from {}", self.devices_url);
        let response = self
            .http
            .get(&self.devices_url)
            .await?
            .error_for_status(&self.devices_url)?;

        let devices = parse_device_list(&response.body)?;
        tracing::debug!("Registry returned {} devices", devices.len());
        Ok(devices)
    }
}

/// Validate a device listing body and convert it into device records
///
/// The body must be an object whose `result` field is an array of objects
/// carrying string `name`, `device_profile_name` and `dev_eui` fields.
pub fn parse_device_list(body: &str) -> crate::Result<Vec<DeviceRecord>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| CatalogError::MalformedResponse(format!("Body is not JSON: {}", e)))?;

    let entries = match value.get("result") {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(CatalogError::MalformedResponse(format!(
                "'result' is not an array: {}",
                other
            )))
        }
        None => {
            return Err(CatalogError::MalformedResponse(
                "Missing 'result' field".to_string(),
            ))
        }
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            RegistryDevice::deserialize(entry)
                .map(DeviceRecord::from)
                .map_err(|e| {
                    CatalogError::MalformedResponse(format!("Device entry {}: {}", index, e))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{HttpResponse, MockHttpClient};

    fn test_config() -> RegistryConfig {
        RegistryConfig {
            base_url: "http://registry.local:8000/".to_string(),
            ..RegistryConfig::default()
        }
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            body: body.to_string(),
        }
    }

    const TWO_DEVICES: &str = r#"{"result": [
        {"name": "Temp1", "device_profile_name": "temp", "dev_eui": "a1b2c3d4e5f60001"},
        {"name": "Detect1", "device_profile_name": "detect", "dev_eui": "a1b2c3d4e5f60002", "description": "basement"}
    ]}"#;

    #[test]
    fn parse_maps_registry_fields() {
        let devices = parse_device_list(TWO_DEVICES).unwrap();
        assert_eq!(
            devices,
            vec![
                DeviceRecord::new("Temp1", "temp", "a1b2c3d4e5f60001"),
                DeviceRecord::new("Detect1", "detect", "a1b2c3d4e5f60002"),
            ]
        );
    }

    #[test]
    fn parse_empty_result() {
        assert!(parse_device_list(r#"{"result": []}"#).unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_non_array_result() {
        let err = parse_device_list(r#"{"result": {"name": "x"}}"#).unwrap_err();
        assert!(matches!(err, CatalogError::MalformedResponse(_)), "{err:?}");
    }

    #[test]
    fn parse_rejects_missing_result() {
        let err = parse_device_list(r#"{"devices": []}"#).unwrap_err();
        assert_eq!(
            err,
            CatalogError::MalformedResponse("Missing 'result' field".to_string())
        );
    }

    #[test]
    fn parse_rejects_non_json() {
        let err = parse_device_list("<html>oops</html>").unwrap_err();
        assert!(matches!(err, CatalogError::MalformedResponse(_)));
    }

    #[test]
    fn parse_names_the_bad_entry() {
        let body = r#"{"result": [
            {"name": "Temp1", "device_profile_name": "temp", "dev_eui": "01"},
            {"name": "Temp2", "device_profile_name": "temp"}
        ]}"#;
        let err = parse_device_list(body).unwrap_err();
        assert!(err.to_string().contains("Device entry 1"), "{err}");
    }

    #[tokio::test]
    async fn fetch_devices_requests_listing_endpoint() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .withf(|url| url == "http://registry.local:8000/api/devices/list")
            .times(1)
            .returning(|_| Box::pin(async { Ok(ok(TWO_DEVICES)) }));

        let client = RegistryClient::new(&test_config(), Arc::new(mock));
        let devices = client.fetch_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].device_type, "detect");
    }

    #[tokio::test]
    async fn fetch_devices_non_success_status_is_network_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 500,
                    body: "Internal Server Error".to_string(),
                })
            })
        });

        let client = RegistryClient::new(&test_config(), Arc::new(mock));
        let err = client.fetch_devices().await.unwrap_err();
        assert!(matches!(err, CatalogError::Network(_)), "{err:?}");
    }

    #[tokio::test]
    async fn fetch_devices_propagates_transport_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_get().returning(|_| {
            Box::pin(async { Err(CatalogError::Network("connection refused".to_string())) })
        });

        let client = RegistryClient::new(&test_config(), Arc::new(mock));
        let err = client.fetch_devices().await.unwrap_err();
        assert_eq!(err, CatalogError::Network("connection refused".to_string()));
    }

    #[tokio::test]
    async fn fetch_devices_malformed_body() {
        let mut mock = MockHttpClient::new();
        mock.expect_get()
            .returning(|_| Box::pin(async { Ok(ok(r#"{"result": "nope"}"#)) }));

        let client = RegistryClient::new(&test_config(), Arc::new(mock));
        let err = client.fetch_devices().await.unwrap_err();
        assert!(matches!(err, CatalogError::MalformedResponse(_)));
    }
}
