use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default)]
    pub mqtt: MqttConf,
    /// Port d'écoute du serveur WebSocket côté navigateurs.
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    /// Période du bilan clients connectés dans les logs (s).
    #[serde(default = "default_report_secs")]
    pub report_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

fn default_ws_port() -> u16 {
    8080
}
fn default_report_secs() -> u64 {
    30
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf::default(),
            ws_port: default_ws_port(),
            report_secs: default_report_secs(),
        }
    }
}

pub async fn load_config() -> BridgeConfig {
    let path = std::env::var("PARQ_BRIDGE_CONFIG").unwrap_or_else(|_| "bridge.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return BridgeConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            eprintln!("[bridge] config invalide: {e}");
            BridgeConfig::default()
        })
    } else {
        eprintln!("[bridge] pas de bridge.yaml, usage config par défaut");
        BridgeConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_falls_back_to_defaults_per_field() {
        let cfg: BridgeConfig = serde_yaml::from_str("ws_port: 9001\n").unwrap();
        assert_eq!(cfg.ws_port, 9001);
        assert_eq!(cfg.mqtt.host, "localhost");
        assert_eq!(cfg.report_secs, 30);
    }

    #[test]
    fn defaults_match_the_public_endpoint() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.ws_port, 8080);
        assert_eq!(cfg.mqtt.port, 1883);
    }
}
