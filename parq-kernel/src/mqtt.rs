/**
 * ÉCOUTE CAPTEUR - Boucle MQTT du pipeline
 *
 * RÔLE : S'abonner aux topics capteur, décoder chaque trame, muter l'état
 * autoritaire et publier les entités changées. Décodage, mutation et
 * publication d'une trame se terminent avant la trame suivante - aucun
 * verrouillage interne nécessaire au-delà du Mutex de l'agrégat.
 */
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use time::OffsetDateTime;
use tokio::task;
use uuid::Uuid;

use crate::config::KernelConfig;
use crate::decoder::{decode_frame, Frame};
use crate::publisher::{self, MqttPublisher};
use crate::state::{ParkingState, Shared};

/// Topic principal du capteur + topics de compatibilité historiques.
pub const SENSOR_TOPICS: [&str; 3] = ["esp32/data", "esp32/parking/occupancy", "parking/esp32/data"];

pub fn create_mqtt_client(cfg: &KernelConfig) -> (AsyncClient, EventLoop) {
    let client_id = format!("parq-kernel-{}", Uuid::new_v4().simple());
    let mut opts = MqttOptions::new(client_id, &cfg.mqtt.host, cfg.mqtt.port);
    opts.set_keep_alive(std::time::Duration::from_secs(15));
    AsyncClient::new(opts, 64)
}

pub fn spawn_sensor_listener(
    state: Shared<ParkingState>,
    client: AsyncClient,
    mut eventloop: EventLoop,
    max_spaces: u8,
) {
    task::spawn(async move {
        for topic in SENSOR_TOPICS {
            if let Err(e) = client.subscribe(topic, QoS::AtLeastOnce).await {
                eprintln!("[mqtt] subscribe {topic} échoué: {e:?}");
                return;
            }
        }
        println!("[mqtt] à l'écoute des trames capteur...");

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(p)))
                    if SENSOR_TOPICS.contains(&p.topic.as_str()) =>
                {
                    match String::from_utf8(p.payload.to_vec()) {
                        Ok(raw) => handle_frame(&state, &client, &raw, max_spaces).await,
                        Err(_) => eprintln!("[mqtt] trame non UTF-8 ignorée"),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("[mqtt] MQTT erreur: {e:?}");
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                }
            }
        }
    });
}

/// Une trame = un lot : mutation puis publication des seuls changements.
async fn handle_frame<C: MqttPublisher>(
    state: &Shared<ParkingState>,
    client: &C,
    raw: &str,
    max_spaces: u8,
) {
    match decode_frame(raw, max_spaces) {
        Frame::Occupancy(assignments) => {
            let changes = {
                state
                    .lock()
                    .apply_occupancy(&assignments, OffsetDateTime::now_utc())
            };
            if changes.is_empty() {
                println!("[mqtt] trame reçue sans changement d'état");
                return;
            }
            for change in &changes {
                println!(
                    "[mqtt] changement détecté: espace {} {}",
                    change.id,
                    if change.occupied { "occupé" } else { "libre" }
                );
                publisher::publish_space(client, state, change.id, Some(*change)).await;
            }
            publisher::publish_stats(client, state).await;
        }
        Frame::Barrier(assignments) => {
            let changes = {
                state
                    .lock()
                    .apply_barrier(&assignments, OffsetDateTime::now_utc())
            };
            for change in changes {
                // direction du mouvement, pas la phase finale
                let action = if change.phase == crate::models::GatePhase::Open {
                    "opening"
                } else {
                    "closing"
                };
                let payload = { state.lock().gate_payload(change.kind, Some(action)) };
                publisher::publish_gate(client, change.kind, &payload).await;
                println!("[mqtt] barrière {} -> {action}", change.kind.as_str());
            }
        }
        Frame::Unrecognized => {
            eprintln!("[mqtt] format de trame non reconnu: {raw}");
        }
    }
}
