use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tracing::{info, warn};

use airdry_common::{config::MqttConfig, data_topic, status_topic, SensorReading};

/// Broker-side reporting: a retained availability message at startup and
/// periodic reading payloads. Keep-alive and reconnection live in the
/// spawned event-loop task; everyone else only observes the link flag.
#[derive(Clone)]
pub struct Telemetry {
    client: AsyncClient,
    link_up: Arc<AtomicBool>,
    status_topic: String,
    data_topic: String,
}

impl Telemetry {
    pub fn connect(mqtt: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(mqtt.client_id.clone(), mqtt.broker.clone(), mqtt.port);
        if !mqtt.username.is_empty() {
            options.set_credentials(mqtt.username.clone(), mqtt.password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, 64);
        let link_up = Arc::new(AtomicBool::new(false));
        spawn_event_loop(eventloop, link_up.clone());

        Self {
            client,
            link_up,
            status_topic: status_topic(&mqtt.base_topic),
            data_topic: data_topic(&mqtt.base_topic),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link_up.load(Ordering::Relaxed)
    }

    pub async fn publish_status(&self, status: &str) -> anyhow::Result<()> {
        self.client
            .publish(
                self.status_topic.as_str(),
                QoS::AtLeastOnce,
                true,
                status.to_string(),
            )
            .await
            .context("failed to publish gateway status")
    }

    pub async fn publish_reading(&self, reading: &SensorReading) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(reading)?;
        self.client
            .publish(self.data_topic.as_str(), QoS::AtLeastOnce, false, payload)
            .await
            .context("failed to publish sensor reading")
    }
}

fn spawn_event_loop(mut eventloop: rumqttc::EventLoop, link_up: Arc<AtomicBool>) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    link_up.store(true, Ordering::Relaxed);
                }
                Ok(_) => {}
                Err(err) => {
                    if link_up.swap(false, Ordering::Relaxed) {
                        warn!("mqtt link lost: {err}");
                    }
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}
