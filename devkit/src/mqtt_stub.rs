/*!
Mock MQTT Client pour développement sans broker

Permet de développer et tester les services Parq sans démarrer un broker
MQTT réel. Enregistre tous les messages publiés et permet de simuler la
réception de trames capteur.
*/

use anyhow::Result;
use rumqttc::QoS;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Mock MQTT Client qui simule rumqttc::AsyncClient
#[derive(Clone)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    message_sender: Arc<Mutex<Option<mpsc::UnboundedSender<MockMessage>>>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self {
            published_messages: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            message_sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Configuration d'un channel pour recevoir les messages simulés
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<MockMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.message_sender.lock().unwrap() = Some(sender);
        receiver
    }

    /// Simule la publication d'un message (compatible avec AsyncClient)
    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        };

        self.published_messages.lock().unwrap().push(message.clone());

        log::info!("[MOCK] publié sur {}: {} octets", message.topic, message.payload.len());
        Ok(())
    }

    /// Simule l'abonnement à un topic (compatible avec AsyncClient)
    pub async fn subscribe<S: Into<String>>(&self, topic: S, _qos: QoS) -> Result<()> {
        let topic = topic.into();
        self.subscriptions.lock().unwrap().push(topic.clone());
        log::info!("[MOCK] abonné à {}", topic);
        Ok(())
    }

    /// Simule la réception d'un message (pour tests)
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
            retain: false,
        };

        if let Some(sender) = self.message_sender.lock().unwrap().as_ref() {
            sender
                .send(message.clone())
                .map_err(|e| anyhow::anyhow!("Send error: {}", e))?;
        }

        log::info!("[MOCK] réception simulée: {}", message.topic);
        Ok(())
    }

    /// Récupère tous les messages publiés (pour assertions de tests)
    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    /// Récupère les abonnements (pour assertions de tests)
    pub fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Trouve les messages publiés sur un topic donné
    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Parse le dernier message d'un topic en JSON
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let messages = self.find_messages_by_topic(topic);
        if let Some(last_msg) = messages.last() {
            let parsed: T = serde_json::from_slice(&last_msg.payload)?;
            Ok(Some(parsed))
        } else {
            Ok(None)
        }
    }

    /// Reset tous les messages enregistrés
    pub fn clear(&self) {
        self.published_messages.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
    }
}

impl Default for MockMqttClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Constructeurs de trames capteur et payloads parking pour les tests.
/// Les trames suivent la grammaire ligne du firmware : `OCC:id:état:...;`
/// et `BAR:id:état:...;` (état 1 = occupé/ouvert, 0 = libre/fermé).
pub struct ParqMessageBuilder;

impl ParqMessageBuilder {
    /// Trame d'occupation, ex. `OCC:1:1:2:0:3:0;`
    pub fn occupancy_frame(assignments: &[(u8, bool)]) -> String {
        Self::frame("OCC", assignments)
    }

    /// Trame barrières, ex. `BAR:1:1:2:0;` (id 1 = entrée, 2 = sortie)
    pub fn barrier_frame(assignments: &[(u8, bool)]) -> String {
        Self::frame("BAR", assignments)
    }

    fn frame(prefix: &str, assignments: &[(u8, bool)]) -> String {
        let body: Vec<String> = assignments
            .iter()
            .map(|(id, on)| format!("{}:{}", id, if *on { 1 } else { 0 }))
            .collect();
        format!("{}:{};", prefix, body.join(":"))
    }

    /// Payload de statut d'un emplacement
    pub fn space_status(id: u8, occupied: bool, distance: u16) -> Value {
        serde_json::json!({
            "occupied": occupied,
            "distance": distance,
            "sensor": format!("HC-SR04-{}", id),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })
    }

    /// Payload de statut d'un porton
    pub fn gate_status(status: &str, servo_angle: u8) -> Value {
        serde_json::json!({
            "status": status,
            "servo_angle": servo_angle,
            "timestamp": chrono::Utc::now().to_rfc3339()
        })
    }

    /// Résumé statistiques minimal (clés camelCase du topic stats)
    pub fn stats_summary(total: u8, occupied: u8) -> Value {
        serde_json::json!({
            "totalSpaces": total,
            "occupiedSpaces": occupied,
            "availableSpaces": total - occupied,
            "occupancyRate": if total == 0 { 0 } else { (occupied as u32 * 100 + total as u32 / 2) / total as u32 },
            "dailyEntries": 0,
            "timestamp": chrono::Utc::now().to_rfc3339()
        })
    }
}
