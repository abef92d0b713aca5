use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KernelConfig {
    #[serde(default)]
    pub mqtt: MqttConf,
    /// Nombre d'emplacements N (ids valides 1..=N), fixé à la configuration.
    #[serde(default = "default_spaces")]
    pub spaces: u8,
    #[serde(default)]
    pub ticks: TickConfig,
    /// Remise à zéro des buckets horaires au changement de jour calendaire.
    /// false = comportement historique (accumulation entre jours).
    #[serde(default)]
    pub reset_hourly_at_midnight: bool,
    /// Séquences portons simulées en interne (cycle temporisé périodique).
    #[serde(default)]
    pub simulate_gates: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct TickConfig {
    /// Publication du résumé stats (s).
    #[serde(default = "default_stats_secs")]
    pub stats_secs: u64,
    /// Écrasement du bucket de l'heure courante (s).
    #[serde(default = "default_hourly_secs")]
    pub hourly_secs: u64,
    /// Échantillon pour la moyenne d'occupation (s).
    #[serde(default = "default_sample_secs")]
    pub sample_secs: u64,
}

fn default_spaces() -> u8 {
    3
}
fn default_stats_secs() -> u64 {
    5
}
fn default_hourly_secs() -> u64 {
    30
}
fn default_sample_secs() -> u64 {
    60
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
        }
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            stats_secs: default_stats_secs(),
            hourly_secs: default_hourly_secs(),
            sample_secs: default_sample_secs(),
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf::default(),
            spaces: default_spaces(),
            ticks: TickConfig::default(),
            reset_hourly_at_midnight: false,
            simulate_gates: false,
        }
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("PARQ_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return KernelConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            eprintln!("[kernel] config invalide: {e}");
            KernelConfig::default()
        })
    } else {
        eprintln!("[kernel] pas de kernel.yaml, usage config par défaut");
        KernelConfig::default()
    }
}
