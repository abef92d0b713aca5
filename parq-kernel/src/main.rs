/**
 * PARQ KERNEL - Point d'entrée du pipeline capteurs
 *
 * RÔLE : Orchestration des modules : config, décodeur, état, stats, MQTT.
 * Reçoit les trames ligne du capteur via le backbone, maintient l'état
 * d'occupation autoritaire et republie les snapshots sur les topics parking.
 *
 * ARCHITECTURE : Pipeline mono-thread coopératif (décode → mute → publie,
 * une trame à la fois) + ticks périodiques indépendants (stats, horaire,
 * échantillonnage) + cycles portons temporisés.
 */

mod config;
mod decoder;
mod gates;
mod models;
mod mqtt;
mod publisher;
mod state;
mod stats;

use crate::config::load_config;
use crate::state::{new_state, ParkingState};
use time::OffsetDateTime;

#[tokio::main]
async fn main() {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    let cfg = load_config().await;
    println!(
        "[kernel] démarrage: {} emplacements, broker {}:{}",
        cfg.spaces, cfg.mqtt.host, cfg.mqtt.port
    );

    // Agrégat unique, passé par référence exclusive à qui s'exécute
    let parking = new_state(ParkingState::new(
        cfg.spaces,
        cfg.reset_hourly_at_midnight,
        OffsetDateTime::now_utc(),
    ));

    let (client, eventloop) = mqtt::create_mqtt_client(&cfg);

    // Écoute des trames capteur (décode → mute → publie)
    mqtt::spawn_sensor_listener(parking.clone(), client.clone(), eventloop, cfg.spaces);

    // Snapshot complet initial pour les consommateurs en aval
    publisher::publish_initial_state(&client, &parking).await;

    // Ticks périodiques : stats, buckets horaires, échantillon moyenne
    stats::spawn_stats_publisher(parking.clone(), client.clone(), cfg.ticks);

    // Séquences portons simulées (désactivées par défaut, trames BAR autoritaires)
    if cfg.simulate_gates {
        gates::spawn_gate_activity(parking.clone(), client.clone());
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("[kernel] attente signal impossible: {e}");
    }

    // Bilan de fin de session, comme sur la console série du montage
    let st = parking.lock();
    println!("[kernel] arrêt du pipeline");
    println!(
        "[kernel]   entrées du jour: {} | occupés: {}/{}",
        st.daily_entries(),
        st.occupied_spaces(),
        st.total_spaces()
    );
    println!(
        "[kernel]   changements: {} | pic: {} | moyenne: {}%",
        st.total_changes_today(),
        st.peak_occupancy(),
        st.average_occupancy_pct()
    );
}
