use chrono::Utc;
use tracing::info;

use airdry_common::{config::SensorConfig, SensorReading};

/// Polls the configured sensor suite and produces one reading per call.
pub struct SensorReader {
    device_id: String,
    sensors: SensorConfig,
    tick: u64,
}

impl SensorReader {
    pub fn new(device_id: String, sensors: SensorConfig) -> Self {
        info!(
            dht_pin = sensors.dht_pin,
            dht_type = %sensors.dht_type,
            use_bme280 = sensors.use_bme280,
            energy_meter = sensors.energy_meter_enabled,
            "sensor suite initialized"
        );
        Self {
            device_id,
            sensors,
            tick: 0,
        }
    }

    pub fn read(&mut self) -> SensorReading {
        self.tick = self.tick.saturating_add(1);

        // Hardware integration point:
        // replace these simulated readings with DHT22/BME280 and energy
        // meter drivers on the device target.
        let temperature_c = 21.0 + ((self.tick % 8) as f32 * 0.2);
        let humidity_pct = 48.0 + ((self.tick % 6) as f32 * 0.5);
        let pressure_hpa = self
            .sensors
            .use_bme280
            .then(|| 1013.2 + ((self.tick % 5) as f32 * 0.3));
        let (power_w, energy_kwh) = if self.sensors.energy_meter_enabled {
            (
                Some(410.0 + ((self.tick % 4) as f32 * 1.5)),
                Some(self.tick as f32 * 0.01),
            )
        } else {
            (None, None)
        };

        SensorReading {
            device_id: self.device_id.clone(),
            timestamp: Utc::now().timestamp(),
            temperature_c,
            humidity_pct,
            pressure_hpa,
            power_w,
            energy_kwh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_follow_the_wiring_config() {
        let mut plain = SensorReader::new("gateway001".to_string(), SensorConfig::default());
        let reading = plain.read();
        assert!(reading.pressure_hpa.is_none());
        assert!(reading.power_w.is_none());
        assert!(reading.energy_kwh.is_none());

        let mut wired = SensorReader::new(
            "gateway001".to_string(),
            SensorConfig {
                use_bme280: true,
                energy_meter_enabled: true,
                ..SensorConfig::default()
            },
        );
        let reading = wired.read();
        assert!(reading.pressure_hpa.is_some());
        assert!(reading.power_w.is_some());
        assert!(reading.energy_kwh.is_some());
    }

    #[test]
    fn readings_carry_the_device_id() {
        let mut reader = SensorReader::new("gateway042".to_string(), SensorConfig::default());
        assert_eq!(reader.read().device_id, "gateway042");
    }
}
