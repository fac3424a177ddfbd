use crate::error::{MeterError, Result};
use crate::metrics::MeasurementResult;
use crate::report::displayed;
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

/// Posts each cycle's result as JSON to a collector. Fire and forget: a
/// failed send is reported to the caller and never retried.
pub struct TelemetryClient {
    endpoint_url: String,
    client: reqwest::Client,
}

impl TelemetryClient {
    pub fn new(endpoint_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MeterError::Telemetry(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint_url: endpoint_url.into(),
            client,
        })
    }

    pub async fn post_measurement(&self, result: &MeasurementResult) -> Result<()> {
        if self.endpoint_url.is_empty() {
            return Err(MeterError::Telemetry("No telemetry endpoint".to_string()));
        }
        let payload = TelemetryPayload::from(result);
        self.client
            .post(&self.endpoint_url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| MeterError::Telemetry(e.to_string()))?;
        Ok(())
    }
}

/// Wire format of one data point. Field names match the collector's schema.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    #[serde(rename = "Vrms_current")]
    pub vrms_current: f64,
    #[serde(rename = "Vrms_sensor")]
    pub vrms_sensor: f64,
    #[serde(rename = "Vrms_grid")]
    pub vrms_grid: f64,
    #[serde(rename = "Irms")]
    pub irms: f64,
    #[serde(rename = "P")]
    pub p: f64,
    #[serde(rename = "S")]
    pub s: f64,
    #[serde(rename = "PF")]
    pub pf: f64,
}

impl From<&MeasurementResult> for TelemetryPayload {
    fn from(result: &MeasurementResult) -> Self {
        Self {
            vrms_current: displayed(result.vrms_current, 4),
            vrms_sensor: displayed(result.vrms_sensor, 4),
            vrms_grid: displayed(result.vrms_grid, 1),
            irms: displayed(result.irms, 3),
            p: displayed(result.real_power(), 3),
            s: displayed(result.apparent_power, 3),
            pf: displayed(result.power_factor, 3),
        }
    }
}
