use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use weatherface_common::{ChangeEvent, FaceConfig, TOPIC_COMPANION_STATUS, TOPIC_DATA_EVENTS};

/// (high °F, low °F, condition id)
const CONDITIONS: [(i32, i32, i32); 6] = [
    (75, 60, 801),
    (72, 58, 800),
    (66, 55, 803),
    (61, 52, 500),
    (58, 49, 211),
    (34, 27, 601),
];

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);
    let interval_secs = std::env::var("COMPANION_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(30);

    let mut mqtt_options = MqttOptions::new("weatherface-companion", mqtt_host, mqtt_port);

    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    mqtt.publish(TOPIC_COMPANION_STATUS, QoS::AtLeastOnce, true, "online")
        .await
        .context("failed to publish companion online status")?;

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("companion mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    info!("companion publisher started, every {interval_secs}s");

    let face = FaceConfig::default();
    let mut tick: u64 = 0;
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let batch = simulated_batch(tick, &face);
        tick = tick.saturating_add(1);

        let payload = serde_json::to_vec(&batch).context("failed to encode weather batch")?;
        mqtt.publish(TOPIC_DATA_EVENTS, QoS::AtLeastOnce, true, payload)
            .await
            .context("failed to publish weather batch")?;
    }
}

/// One `changed` event at the weather path, cycling through `CONDITIONS`.
fn simulated_batch(tick: u64, face: &FaceConfig) -> Vec<ChangeEvent> {
    let (high, low, condition) = CONDITIONS[(tick % CONDITIONS.len() as u64) as usize];

    let mut payload = Map::new();
    payload.insert(face.high_temp_key.clone(), json!(format!("{high}°")));
    payload.insert(face.low_temp_key.clone(), json!(format!("{low}°")));
    payload.insert(face.weather_id_key.clone(), Value::from(condition));

    vec![ChangeEvent::changed(face.weather_path.clone(), payload)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use weatherface_common::{WeatherSnapshot, WeatherSyncChannel};

    #[test]
    fn batches_are_accepted_by_the_face() {
        let face = FaceConfig::default();
        let mut channel = WeatherSyncChannel::new(&face);
        channel.connect();
        channel.on_connected();
        let mut weather = WeatherSnapshot::fallback(&face);

        assert!(channel.on_data_event(&simulated_batch(0, &face), &mut weather));
        assert_eq!(weather, WeatherSnapshot::new("75°", "60°", 801));
    }

    #[test]
    fn cycles_through_conditions() {
        let face = FaceConfig::default();
        let first = simulated_batch(0, &face);
        let wrapped = simulated_batch(CONDITIONS.len() as u64, &face);
        assert_eq!(first, wrapped);
        assert_ne!(first, simulated_batch(1, &face));
    }
}
