/**
 * REGISTRE CLIENTS - Fan-out vers les sockets navigateurs
 *
 * RÔLE : Tenir la table des clients WebSocket connectés et diffuser
 * chaque enveloppe à tous. Un client dont le canal est fermé est
 * expulsé du registre lors de la diffusion suivante.
 */
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<String>>>>,
    next_id: Arc<AtomicU64>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un nouveau client et rend son identifiant plus le
    /// récepteur que la boucle socket consommera.
    pub fn register(&self) -> (u64, mpsc::UnboundedReceiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.lock().insert(id, tx);
        (id, rx)
    }

    pub fn unregister(&self, id: u64) -> bool {
        self.clients.lock().remove(&id).is_some()
    }

    /// Diffuse un texte à tous les clients, rend le nombre de livraisons.
    /// Les canaux fermés rencontrés en route sont retirés de la table.
    pub fn broadcast(&self, text: &str) -> usize {
        // Snapshot hors verrou : l'envoi ne bloque pas les connexions
        let snapshot: Vec<(u64, mpsc::UnboundedSender<String>)> = self
            .clients
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, tx) in snapshot {
            if tx.send(text.to_string()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            let mut clients = self.clients.lock();
            for id in &dead {
                clients.remove(id);
            }
            eprintln!("[bridge] {} client(s) morts expulsés", dead.len());
        }
        delivered
    }

    pub fn live_count(&self) -> usize {
        self.clients.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_registered_client() {
        let reg = ClientRegistry::new();
        let mut receivers: Vec<_> = (0..3).map(|_| reg.register().1).collect();

        assert_eq!(reg.broadcast("hello"), 3);
        for rx in &mut receivers {
            assert_eq!(rx.recv().await.unwrap(), "hello");
        }
    }

    #[tokio::test]
    async fn dead_client_is_evicted_and_others_still_served() {
        let reg = ClientRegistry::new();
        let mut kept = Vec::new();
        for i in 0..5 {
            let (_, rx) = reg.register();
            if i != 2 {
                kept.push(rx);
            }
            // rx du client 2 est droppé ici : canal fermé
        }
        assert_eq!(reg.live_count(), 5);

        assert_eq!(reg.broadcast("tick"), 4);
        assert_eq!(reg.live_count(), 4);
        for rx in &mut kept {
            assert_eq!(rx.recv().await.unwrap(), "tick");
        }

        // diffusion suivante : plus aucun mort à expulser
        assert_eq!(reg.broadcast("tock"), 4);
        assert_eq!(reg.live_count(), 4);
    }

    #[test]
    fn unregister_is_idempotent() {
        let reg = ClientRegistry::new();
        let (id, _rx) = reg.register();
        assert!(reg.unregister(id));
        assert!(!reg.unregister(id));
        assert_eq!(reg.live_count(), 0);
    }

    #[test]
    fn ids_are_unique_across_registrations() {
        let reg = ClientRegistry::new();
        let (a, _ra) = reg.register();
        reg.unregister(a);
        let (b, _rb) = reg.register();
        assert_ne!(a, b);
    }
}
