/**
 * SERVEUR WEBSOCKET - Façade navigateurs du pont
 *
 * RÔLE : Accepter les upgrades WebSocket, inscrire chaque socket au
 * registre et pousser les enveloppes reçues du backbone. Le trafic
 * entrant des navigateurs est ignoré (pont unidirectionnel), seule la
 * fermeture est traitée.
 */
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::any,
    Router,
};
use futures::{SinkExt, StreamExt};

use crate::registry::ClientRegistry;

pub fn router(registry: ClientRegistry) -> Router {
    Router::new().route("/", any(ws_handler)).with_state(registry)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(registry): State<ClientRegistry>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

async fn handle_socket(socket: WebSocket, registry: ClientRegistry) {
    let (id, mut outbound) = registry.register();
    println!(
        "[bridge] client #{id} connecté ({} au total)",
        registry.live_count()
    );

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            env = outbound.recv() => {
                match env {
                    Some(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    // registre fermé : plus rien à relayer
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // pont unidirectionnel : tout le reste est ignoré
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    registry.unregister(id);
    println!(
        "[bridge] client #{id} déconnecté ({} restants)",
        registry.live_count()
    );
}
