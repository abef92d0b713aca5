//! Wire types received from the bridge.
//!
//! Everything here mirrors what the kernel publishes on the parking topics.
//! Fields are forgiving on deserialization (defaults, optionals) so a
//! partial or older payload never takes the whole view down.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One relayed backbone message: the original topic, the payload as an
/// opaque string, and the bridge-side timestamp in epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub topic: String,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GatePhase {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateKind {
    Entry,
    Exit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParkingSpace {
    pub occupied: bool,
    #[serde(default)]
    pub distance: u16,
    #[serde(default)]
    pub sensor: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_detected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateStatus {
    pub status: GatePhase,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub servo_angle: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl Default for GateStatus {
    fn default() -> Self {
        Self {
            status: GatePhase::Closed,
            timestamp: Utc::now(),
            servo_angle: 0,
            action: None,
        }
    }
}

/// Aggregate statistics summary, camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemStats {
    pub total_spaces: u8,
    pub occupied_spaces: u8,
    pub available_spaces: u8,
    pub occupancy_rate: u8,
    pub daily_entries: u32,
    pub total_changes_today: u32,
    pub peak_occupancy: u8,
    pub average_occupancy_today: u8,
    pub last_entry: Option<DateTime<Utc>>,
    pub last_exit: Option<DateTime<Utc>>,
    pub entry_gate: Option<GatePhase>,
    pub exit_gate: Option<GatePhase>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One hourly occupancy bucket, `hour` formatted as `"HH:00"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HourlyData {
    pub hour: String,
    pub occupied: u8,
    pub available: u8,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_stats_payload_still_deserializes() {
        let json = r#"{"totalSpaces":3,"occupiedSpaces":1}"#;
        let stats: SystemStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.total_spaces, 3);
        assert_eq!(stats.occupied_spaces, 1);
        assert_eq!(stats.daily_entries, 0);
        assert!(stats.last_entry.is_none());
    }

    #[test]
    fn space_payload_parses_kernel_shape() {
        // battery arrives as a fractional float (85 + random noise)
        let json = r#"{"occupied":true,"distance":9,"sensor":"HC-SR04-1",
            "timestamp":"2026-08-29T10:00:00Z","battery":91.4,
            "change_detected":true,"previous_state":false}"#;
        let space: ParkingSpace = serde_json::from_str(json).unwrap();
        assert!(space.occupied);
        assert_eq!(space.battery, Some(91.4));
        assert_eq!(space.previous_state, Some(false));
    }

    #[test]
    fn gate_phase_uses_lowercase_wire_names() {
        let gate: GateStatus = serde_json::from_str(
            r#"{"status":"opening","timestamp":"2026-08-29T10:00:00Z","servo_angle":45}"#,
        )
        .unwrap();
        assert_eq!(gate.status, GatePhase::Opening);
        assert_eq!(gate.servo_angle, 45);
    }
}
