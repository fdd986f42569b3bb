use serde::Serialize;

/// One measurement cycle. Produced on demand, consumed immediately by the
/// admin data query and the telemetry publish path, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub device_id: String,
    /// Epoch seconds at poll time.
    pub timestamp: i64,
    pub temperature_c: f32,
    pub humidity_pct: f32,
    /// Present when a BME280 is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_hpa: Option<f32>,
    /// Present when the energy meter is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_w: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_kwh: Option<f32>,
}
