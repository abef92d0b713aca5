/*!
Test Harness pour le pipeline Parq

Facilite l'écriture de tests avec:
- Setup automatique du mock MQTT
- Injection de trames capteur formatées
- Assertions sur les messages publiés
*/

use crate::mqtt_stub::{MockMqttClient, ParqMessageBuilder};
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Topic principal des trames capteur injectées par le harness.
pub const SENSOR_TOPIC: &str = "esp32/data";

/// Harness de test complet pour le pipeline parking
pub struct TestHarness {
    pub mqtt_client: MockMqttClient,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    topic: String,
    expected_count: usize,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        Self {
            mqtt_client: MockMqttClient::new(),
            expectations: Vec::new(),
        }
    }

    /// Ajoute une expectation: on s'attend à N messages sur un topic
    pub fn expect_messages(&mut self, topic: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            topic: topic.to_string(),
            expected_count: count,
        });
        self
    }

    /// Injecte une trame d'occupation comme si le capteur l'avait émise
    pub async fn send_occupancy_frame(&self, assignments: &[(u8, bool)]) -> Result<()> {
        let frame = ParqMessageBuilder::occupancy_frame(assignments);
        self.mqtt_client
            .simulate_incoming(SENSOR_TOPIC, frame.into_bytes())
            .await?;
        Ok(())
    }

    /// Injecte une trame barrières
    pub async fn send_barrier_frame(&self, assignments: &[(u8, bool)]) -> Result<()> {
        let frame = ParqMessageBuilder::barrier_frame(assignments);
        self.mqtt_client
            .simulate_incoming(SENSOR_TOPIC, frame.into_bytes())
            .await?;
        Ok(())
    }

    /// Attend qu'un message apparaisse sur un topic (polling 50 ms)
    pub async fn wait_for_message(&self, topic: &str, timeout_ms: u64) -> Result<Option<Value>> {
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if let Some(msg) = self.mqtt_client.get_last_json_message::<Value>(topic)? {
                return Ok(Some(msg));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        log::warn!("timeout en attendant un message sur {}", topic);
        Ok(None)
    }

    /// Vérifie toutes les expectations configurées
    pub fn verify_expectations(&self) -> Result<()> {
        for expectation in &self.expectations {
            let actual = self
                .mqtt_client
                .find_messages_by_topic(&expectation.topic)
                .len();
            if actual != expectation.expected_count {
                anyhow::bail!(
                    "Expectation échouée pour '{}': {} messages attendus, {} reçus",
                    expectation.topic,
                    expectation.expected_count,
                    actual
                );
            }
        }
        Ok(())
    }

    /// Assert qu'un champ a une valeur donnée dans le dernier message d'un topic
    pub fn assert_field_equals(&self, topic: &str, field_path: &str, expected: &Value) -> Result<()> {
        if let Some(msg) = self.mqtt_client.get_last_json_message::<Value>(topic)? {
            if let Some(actual) = get_nested_field(&msg, field_path) {
                if actual == expected {
                    return Ok(());
                }
                anyhow::bail!(
                    "Champ '{}' divergent: attendu {:?}, reçu {:?}",
                    field_path,
                    expected,
                    actual
                );
            }
        }
        anyhow::bail!("Champ '{}' absent du dernier message sur {}", field_path, topic);
    }

    /// Stats sur les messages collectés
    pub fn get_stats(&self) -> TestStats {
        let messages = self.mqtt_client.get_published_messages();
        let mut topic_counts = HashMap::new();

        for msg in &messages {
            *topic_counts.entry(msg.topic.clone()).or_insert(0) += 1;
        }

        TestStats {
            total_messages: messages.len(),
            topic_counts,
            subscriptions: self.mqtt_client.get_subscriptions(),
        }
    }

    /// Reset le harness pour un nouveau test
    pub fn reset(&mut self) {
        self.mqtt_client.clear();
        self.expectations.clear();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn get_nested_field<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        match current {
            Value::Object(obj) => current = obj.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

#[derive(Debug)]
pub struct TestStats {
    pub total_messages: usize,
    pub topic_counts: HashMap<String, usize>,
    pub subscriptions: Vec<String>,
}

impl TestStats {
    pub fn print(&self) {
        println!("Statistiques de test:");
        println!("  messages: {}", self.total_messages);
        for (topic, count) in &self.topic_counts {
            println!("    {}: {} messages", topic, count);
        }
        println!("  abonnements: {:?}", self.subscriptions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_harness_basic_functionality() {
        let mut harness = TestHarness::new();
        harness.expect_messages("parking/stats/summary", 1);

        let stats = ParqMessageBuilder::stats_summary(3, 1);
        harness
            .mqtt_client
            .publish(
                "parking/stats/summary",
                rumqttc::QoS::AtLeastOnce,
                false,
                serde_json::to_vec(&stats).unwrap(),
            )
            .await
            .unwrap();

        harness.verify_expectations().unwrap();
        harness
            .assert_field_equals("parking/stats/summary", "occupiedSpaces", &serde_json::json!(1))
            .unwrap();

        assert_eq!(harness.get_stats().total_messages, 1);
    }

    #[tokio::test]
    async fn test_frame_injection_reaches_receiver() {
        let harness = TestHarness::new();
        let mut rx = harness.mqtt_client.setup_receiver();

        harness.send_occupancy_frame(&[(1, true)]).await.unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.topic, SENSOR_TOPIC);
        assert_eq!(msg.payload, b"OCC:1:1;");
    }
}
