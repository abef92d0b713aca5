/*!
# Parq DevKit - Stubs et Utilitaires pour Développement

Bibliothèque facilitant le développement des services Parq avec:
- Stub MQTT pour tests sans broker
- Constructeurs de trames capteur et payloads parking
- Harness de test du pipeline
*/

pub mod mqtt_stub;
pub mod test_utils;

pub use mqtt_stub::{MockMqttClient, ParqMessageBuilder};
pub use test_utils::TestHarness;
