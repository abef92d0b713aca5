/**
 * PARQ BRIDGE - Pont MQTT vers WebSocket
 *
 * RÔLE : Rendre le backbone MQTT lisible depuis un navigateur. Chaque
 * publication amont devient une enveloppe JSON {topic, message, timestamp}
 * poussée à tous les clients WebSocket connectés. Aucun payload n'est
 * réinterprété en chemin.
 */

mod config;
mod envelope;
mod mqtt;
mod registry;
mod ws;

use anyhow::Context;
use tokio::net::TcpListener;

use crate::config::load_config;
use crate::registry::ClientRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cfg = load_config().await;
    println!(
        "[bridge] démarrage: broker {}:{}, WebSocket :{}",
        cfg.mqtt.host, cfg.mqtt.port, cfg.ws_port
    );

    let registry = ClientRegistry::new();

    let (client, eventloop) = mqtt::create_mqtt_client(&cfg);
    mqtt::spawn_backbone_listener(registry.clone(), client, eventloop);
    mqtt::spawn_status_report(registry.clone(), cfg.report_secs);

    let app = ws::router(registry);
    let listener = TcpListener::bind(("0.0.0.0", cfg.ws_port))
        .await
        .with_context(|| format!("bind du port WebSocket {}", cfg.ws_port))?;
    println!("[bridge] serveur WebSocket prêt sur ws://0.0.0.0:{}", cfg.ws_port);

    axum::serve(listener, app)
        .await
        .context("serveur WebSocket interrompu")?;
    Ok(())
}
