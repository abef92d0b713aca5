/**
 * BACKBONE MQTT - Amont du pont
 *
 * RÔLE : S'abonner aux topics du parc plus la trame capteur brute, et
 * transformer chaque publication en enveloppe diffusée au registre.
 * Le payload n'est jamais réinterprété : le pont est transparent.
 */
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::task;
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::envelope::Envelope;
use crate::registry::ClientRegistry;

/// Abonnements fixes : trame capteur brute + topic set du parc.
pub const BRIDGE_TOPICS: [&str; 5] = [
    "esp32/data",
    "parking/spaces/+/status",
    "parking/gates/+/status",
    "parking/stats/summary",
    "parking/analytics/hourly",
];

pub fn create_mqtt_client(cfg: &BridgeConfig) -> (AsyncClient, EventLoop) {
    let client_id = format!("parq-bridge-{}", Uuid::new_v4().simple());
    let mut opts = MqttOptions::new(client_id, &cfg.mqtt.host, cfg.mqtt.port);
    opts.set_keep_alive(std::time::Duration::from_secs(15));
    AsyncClient::new(opts, 64)
}

pub fn spawn_backbone_listener(
    registry: ClientRegistry,
    client: AsyncClient,
    mut eventloop: EventLoop,
) {
    task::spawn(async move {
        for topic in BRIDGE_TOPICS {
            if let Err(e) = client.subscribe(topic, QoS::AtLeastOnce).await {
                eprintln!("[bridge] subscribe {topic} échoué: {e:?}");
                return;
            }
        }
        println!("[bridge] abonné au backbone, relais actif");

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(p))) => {
                    match String::from_utf8(p.payload.to_vec()) {
                        Ok(message) => {
                            relay(&registry, &p.topic, &message);
                        }
                        Err(_) => eprintln!("[bridge] payload non UTF-8 ignoré ({})", p.topic),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("[bridge] MQTT erreur: {e:?}");
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                }
            }
        }
    });
}

/// Une publication backbone = une enveloppe diffusée telle quelle.
fn relay(registry: &ClientRegistry, topic: &str, message: &str) {
    let env = Envelope::now(topic, message);
    let delivered = registry.broadcast(&env.to_ws_text());
    if delivered > 0 {
        println!("[bridge] {topic} relayé à {delivered} client(s)");
    }
}

/// Ligne d'état périodique, comme la console du pont d'origine.
pub fn spawn_status_report(registry: ClientRegistry, period_secs: u64) {
    task::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(period_secs));
        tick.tick().await; // premier tick immédiat, sans intérêt
        loop {
            tick.tick().await;
            println!("[bridge] clients connectés: {}", registry.live_count());
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relay_wraps_payload_in_an_envelope() {
        let registry = ClientRegistry::new();
        let (_, mut rx) = registry.register();

        relay(&registry, "parking/stats/summary", r#"{"totalSpaces":3}"#);

        let text = rx.recv().await.unwrap();
        let env: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(env.topic, "parking/stats/summary");
        assert_eq!(env.message, r#"{"totalSpaces":3}"#);
        assert!(env.timestamp > 0);
    }

    #[test]
    fn subscriptions_cover_sensor_and_parking_topics() {
        assert!(BRIDGE_TOPICS.contains(&"esp32/data"));
        assert!(BRIDGE_TOPICS.contains(&"parking/analytics/hourly"));
        assert_eq!(BRIDGE_TOPICS.len(), 5);
    }
}
