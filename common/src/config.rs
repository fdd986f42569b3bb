use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the persisted settings document and on admin API update
/// bodies. Anything larger is rejected wholesale before parsing.
pub const MAX_DOCUMENT_BYTES: usize = 1024;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document is {len} bytes, cap is {MAX_DOCUMENT_BYTES}")]
    Oversized { len: usize },
    #[error("invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: String,
    pub id: String,
    #[serde(rename = "type")]
    pub device_type: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "AirDry-Gateway".to_string(),
            id: "gateway001".to_string(),
            device_type: "airdry-gateway".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub ssid: String,
    pub password: String,
    pub ap_ssid: String,
    pub ap_password: String,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            ap_ssid: "AirDry-Setup".to_string(),
            ap_password: "setup1234".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub base_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: "192.168.1.100".to_string(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            client_id: "gateway001".to_string(),
            base_topic: "airdry/devices/gateway001".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub dht_pin: i32,
    pub dht_type: String,
    pub use_bme280: bool,
    pub energy_meter_enabled: bool,
    pub energy_meter_rx_pin: i32,
    pub energy_meter_tx_pin: i32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            dht_pin: 4,
            dht_type: "DHT22".to_string(),
            use_bme280: false,
            energy_meter_enabled: false,
            energy_meter_rx_pin: 16,
            energy_meter_tx_pin: 17,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub relay_pin: i32,
    pub has_speed_control: bool,
    pub speed_control_pin: i32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            relay_pin: 5,
            has_speed_control: false,
            speed_control_pin: 13,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Seconds between sensor polls.
    pub read_interval: u64,
    /// Seconds between telemetry publishes.
    pub reporting_interval: u64,
    pub ota_enabled: bool,
    pub debug_mode: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            read_interval: 60,
            reporting_interval: 300,
            ota_enabled: true,
            debug_mode: false,
        }
    }
}

/// The full settings document. Missing sections and missing fields both
/// fall back to their defaults, so any partial document deserializes into
/// a complete value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub device: DeviceConfig,
    pub wifi: WifiConfig,
    pub mqtt: MqttConfig,
    pub sensors: SensorConfig,
    pub control: ControlConfig,
    pub system: SystemConfig,
}

impl GatewayConfig {
    /// Decodes a persisted document, enforcing the size cap before any
    /// parsing takes place.
    pub fn from_document(raw: &[u8]) -> Result<Self, DocumentError> {
        if raw.len() > MAX_DOCUMENT_BYTES {
            return Err(DocumentError::Oversized { len: raw.len() });
        }
        Ok(serde_json::from_slice(raw)?)
    }

    /// Merges a partial update. Only keys present in the update override
    /// current values; blank secret values keep the stored secret.
    pub fn merge(&mut self, update: ConfigUpdate) {
        if let Some(device) = update.device {
            if let Some(name) = device.name {
                self.device.name = name;
            }
            if let Some(id) = device.id {
                self.device.id = id;
            }
            if let Some(device_type) = device.device_type {
                self.device.device_type = device_type;
            }
        }

        if let Some(wifi) = update.wifi {
            if let Some(ssid) = wifi.ssid {
                self.wifi.ssid = ssid;
            }
            if let Some(password) = wifi.password {
                if !password.is_empty() {
                    self.wifi.password = password;
                }
            }
            if let Some(ap_ssid) = wifi.ap_ssid {
                self.wifi.ap_ssid = ap_ssid;
            }
            if let Some(ap_password) = wifi.ap_password {
                if !ap_password.is_empty() {
                    self.wifi.ap_password = ap_password;
                }
            }
        }

        if let Some(mqtt) = update.mqtt {
            if let Some(broker) = mqtt.broker {
                self.mqtt.broker = broker;
            }
            if let Some(port) = mqtt.port {
                self.mqtt.port = port;
            }
            if let Some(username) = mqtt.username {
                self.mqtt.username = username;
            }
            if let Some(password) = mqtt.password {
                if !password.is_empty() {
                    self.mqtt.password = password;
                }
            }
            if let Some(client_id) = mqtt.client_id {
                self.mqtt.client_id = client_id;
            }
            if let Some(base_topic) = mqtt.base_topic {
                self.mqtt.base_topic = base_topic;
            }
        }

        if let Some(sensors) = update.sensors {
            if let Some(dht_pin) = sensors.dht_pin {
                self.sensors.dht_pin = dht_pin;
            }
            if let Some(dht_type) = sensors.dht_type {
                self.sensors.dht_type = dht_type;
            }
            if let Some(use_bme280) = sensors.use_bme280 {
                self.sensors.use_bme280 = use_bme280;
            }
            if let Some(enabled) = sensors.energy_meter_enabled {
                self.sensors.energy_meter_enabled = enabled;
            }
            if let Some(rx_pin) = sensors.energy_meter_rx_pin {
                self.sensors.energy_meter_rx_pin = rx_pin;
            }
            if let Some(tx_pin) = sensors.energy_meter_tx_pin {
                self.sensors.energy_meter_tx_pin = tx_pin;
            }
        }

        if let Some(control) = update.control {
            if let Some(relay_pin) = control.relay_pin {
                self.control.relay_pin = relay_pin;
            }
            if let Some(has_speed_control) = control.has_speed_control {
                self.control.has_speed_control = has_speed_control;
            }
            if let Some(speed_control_pin) = control.speed_control_pin {
                self.control.speed_control_pin = speed_control_pin;
            }
        }

        if let Some(system) = update.system {
            if let Some(read_interval) = system.read_interval {
                self.system.read_interval = read_interval;
            }
            if let Some(reporting_interval) = system.reporting_interval {
                self.system.reporting_interval = reporting_interval;
            }
            if let Some(ota_enabled) = system.ota_enabled {
                self.system.ota_enabled = ota_enabled;
            }
            if let Some(debug_mode) = system.debug_mode {
                self.system.debug_mode = debug_mode;
            }
        }
    }

    /// Copy for read responses with every secret blanked. Blank pairs with
    /// the merge rule above: writing the blank back keeps the stored
    /// secret.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.wifi.password.clear();
        config.wifi.ap_password.clear();
        config.mqtt.password.clear();
        config
    }
}

/// Partial settings document accepted by the admin write path. Every
/// section and every field is optional; unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub device: Option<DeviceUpdate>,
    pub wifi: Option<WifiUpdate>,
    pub mqtt: Option<MqttUpdate>,
    pub sensors: Option<SensorUpdate>,
    pub control: Option<ControlUpdate>,
    pub system: Option<SystemUpdate>,
}

impl ConfigUpdate {
    pub fn from_document(raw: &[u8]) -> Result<Self, DocumentError> {
        if raw.len() > MAX_DOCUMENT_BYTES {
            return Err(DocumentError::Oversized { len: raw.len() });
        }
        Ok(serde_json::from_slice(raw)?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WifiUpdate {
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub ap_ssid: Option<String>,
    pub ap_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MqttUpdate {
    pub broker: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub base_topic: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SensorUpdate {
    pub dht_pin: Option<i32>,
    pub dht_type: Option<String>,
    pub use_bme280: Option<bool>,
    pub energy_meter_enabled: Option<bool>,
    pub energy_meter_rx_pin: Option<i32>,
    pub energy_meter_tx_pin: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControlUpdate {
    pub relay_pin: Option<i32>,
    pub has_speed_control: Option<bool>,
    pub speed_control_pin: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SystemUpdate {
    pub read_interval: Option<u64>,
    pub reporting_interval: Option<u64>,
    pub ota_enabled: Option<bool>,
    pub debug_mode: Option<bool>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn update(raw: &str) -> ConfigUpdate {
        ConfigUpdate::from_document(raw.as_bytes()).unwrap()
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = GatewayConfig::from_document(b"{}").unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn partial_section_fills_missing_fields_from_defaults() {
        let config =
            GatewayConfig::from_document(br#"{"mqtt":{"broker":"broker.local"}}"#).unwrap();

        assert_eq!(config.mqtt.broker, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.system, SystemConfig::default());
    }

    #[test]
    fn oversized_document_rejected_before_parse() {
        // Not valid JSON, so a parse attempt would produce Parse instead.
        let raw = vec![b'x'; MAX_DOCUMENT_BYTES + 1];
        let err = GatewayConfig::from_document(&raw).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Oversized {
                len
            } if len == MAX_DOCUMENT_BYTES + 1
        ));
    }

    #[test]
    fn document_at_the_cap_parses() {
        let mut raw = br#"{"device":{"name":"padded"}}"#.to_vec();
        raw.resize(MAX_DOCUMENT_BYTES, b' ');
        let config = GatewayConfig::from_document(&raw).unwrap();
        assert_eq!(config.device.name, "padded");
    }

    #[test]
    fn corrupt_document_is_a_parse_error() {
        let err = ConfigUpdate::from_document(b"{not json").unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn merge_leaves_absent_fields_unchanged() {
        let mut config = GatewayConfig::default();
        config.merge(update(r#"{"system":{"read_interval":30}}"#));

        assert_eq!(config.system.read_interval, 30);
        assert_eq!(config.system.reporting_interval, 300);

        let mut expected = GatewayConfig::default();
        expected.system.read_interval = 30;
        assert_eq!(config, expected);
    }

    #[test]
    fn merge_ignores_unknown_keys() {
        let mut config = GatewayConfig::default();
        config.merge(update(
            r#"{"system":{"read_interval":15,"bogus":true},"extra":{"x":1}}"#,
        ));
        assert_eq!(config.system.read_interval, 15);
    }

    #[test]
    fn blank_secret_keeps_stored_value() {
        let mut config = GatewayConfig::default();
        config.wifi.password = "station-secret".to_string();
        config.mqtt.password = "broker-secret".to_string();

        config.merge(update(
            r#"{"wifi":{"ssid":"attic","password":""},"mqtt":{"password":""}}"#,
        ));

        assert_eq!(config.wifi.ssid, "attic");
        assert_eq!(config.wifi.password, "station-secret");
        assert_eq!(config.mqtt.password, "broker-secret");
    }

    #[test]
    fn non_blank_secret_overwrites() {
        let mut config = GatewayConfig::default();
        config.wifi.password = "old".to_string();

        config.merge(update(r#"{"wifi":{"password":"new"}}"#));

        assert_eq!(config.wifi.password, "new");
    }

    #[test]
    fn redacted_blanks_every_secret_and_nothing_else() {
        let mut config = GatewayConfig::default();
        config.wifi.ssid = "attic".to_string();
        config.wifi.password = "station-secret".to_string();
        config.wifi.ap_password = "fallback-secret".to_string();
        config.mqtt.username = "gateway".to_string();
        config.mqtt.password = "broker-secret".to_string();

        let redacted = config.redacted();

        assert_eq!(redacted.wifi.password, "");
        assert_eq!(redacted.wifi.ap_password, "");
        assert_eq!(redacted.mqtt.password, "");
        assert_eq!(redacted.wifi.ssid, "attic");
        assert_eq!(redacted.mqtt.username, "gateway");

        let raw = serde_json::to_string(&redacted).unwrap();
        assert!(!raw.contains("station-secret"));
        assert!(!raw.contains("fallback-secret"));
        assert!(!raw.contains("broker-secret"));
    }

    #[test]
    fn full_document_round_trips() {
        let mut config = GatewayConfig::default();
        config.device.id = "gateway042".to_string();
        config.mqtt.base_topic = "airdry/devices/gateway042".to_string();
        config.sensors.use_bme280 = true;
        config.system.read_interval = 30;

        let raw = serde_json::to_vec(&config).unwrap();
        assert!(raw.len() <= MAX_DOCUMENT_BYTES);

        let decoded = GatewayConfig::from_document(&raw).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn device_type_uses_the_persisted_key() {
        let config = GatewayConfig::from_document(br#"{"device":{"type":"bench"}}"#).unwrap();
        assert_eq!(config.device.device_type, "bench");

        let raw = serde_json::to_string(&config).unwrap();
        assert!(raw.contains(r#""type":"bench""#));
    }
}
