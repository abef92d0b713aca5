use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifie un des deux portons du parking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateKind {
    Entry,
    Exit,
}

impl GateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GateKind::Entry => "entry",
            GateKind::Exit => "exit",
        }
    }
}

/// Cycle servo : closed → opening → open → closing → closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePhase {
    Closed,
    Opening,
    Open,
    Closing,
}

impl GatePhase {
    /// Angle servo corrélé à la phase (SG90 : 0° fermé, 90° ouvert).
    pub fn servo_angle(self) -> u8 {
        match self {
            GatePhase::Closed => 0,
            GatePhase::Opening | GatePhase::Closing => 45,
            GatePhase::Open => 90,
        }
    }

    /// Libellé `action` publié avec chaque snapshot de porton.
    pub fn action_label(self) -> &'static str {
        match self {
            GatePhase::Closed => "closed",
            GatePhase::Opening => "opening",
            GatePhase::Open => "opened",
            GatePhase::Closing => "closing",
        }
    }
}

/// État interne d'un emplacement, muté uniquement via les événements décodés.
#[derive(Debug, Clone)]
pub struct SpaceState {
    pub id: u8,
    pub occupied: bool,
    pub distance_cm: u8,
    pub sensor: String,
    pub last_change: OffsetDateTime,
}

/// État interne d'un porton.
#[derive(Debug, Clone)]
pub struct GateState {
    pub phase: GatePhase,
    pub last_change: OffsetDateTime,
}

/// Changement effectif d'un emplacement (previous ≠ new).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceChange {
    pub id: u8,
    pub was_occupied: bool,
    pub occupied: bool,
}

impl SpaceChange {
    pub fn is_entry(self) -> bool {
        !self.was_occupied && self.occupied
    }

    pub fn is_exit(self) -> bool {
        self.was_occupied && !self.occupied
    }
}

/// Changement effectif d'un porton suite à une trame BAR décodée.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateChange {
    pub kind: GateKind,
    pub phase: GatePhase,
}

// ---- Payloads wire (noms de champs alignés sur le dashboard) ----

/// Snapshot publié sur parking/spaces/{id}/status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceStatusPayload {
    pub occupied: bool,
    pub distance: u8,
    pub sensor: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_detected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<bool>,
}

/// Snapshot publié sur parking/gates/{entry|exit}/status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateStatusPayload {
    pub status: GatePhase,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub servo_angle: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Résumé publié sur parking/stats/summary, recalculé en entier à chaque tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummaryPayload {
    pub total_spaces: u8,
    pub occupied_spaces: u8,
    pub available_spaces: u8,
    pub daily_entries: u32,
    pub occupancy_rate: u8,
    pub system_uptime: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_entry: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_exit: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub total_changes_today: u32,
    pub peak_occupancy: u8,
    pub average_occupancy_today: u8,
}

/// Une entrée du tableau parking/analytics/hourly (toujours 24 entrées).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub hour: String,
    pub occupied: u8,
    pub available: u8,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl HourlyBucket {
    pub fn empty(hour: u8, total_spaces: u8, now: OffsetDateTime) -> Self {
        Self {
            hour: format!("{hour:02}:00"),
            occupied: 0,
            available: total_spaces,
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn servo_angle_correlates_with_phase() {
        assert_eq!(GatePhase::Closed.servo_angle(), 0);
        assert_eq!(GatePhase::Opening.servo_angle(), 45);
        assert_eq!(GatePhase::Open.servo_angle(), 90);
        assert_eq!(GatePhase::Closing.servo_angle(), 45);
    }

    #[test]
    fn gate_phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&GatePhase::Opening).unwrap(), "\"opening\"");
        assert_eq!(serde_json::to_string(&GateKind::Exit).unwrap(), "\"exit\"");
    }

    #[test]
    fn stats_payload_uses_dashboard_field_names() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let stats = StatsSummaryPayload {
            total_spaces: 3,
            occupied_spaces: 1,
            available_spaces: 2,
            daily_entries: 4,
            occupancy_rate: 33,
            system_uptime: 120,
            last_entry: now,
            last_exit: now,
            timestamp: now,
            total_changes_today: 6,
            peak_occupancy: 2,
            average_occupancy_today: 21,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalSpaces"], 3);
        assert_eq!(json["occupancyRate"], 33);
        assert_eq!(json["averageOccupancyToday"], 21);
        assert_eq!(json["lastEntry"], "1970-01-01T00:00:00Z");
    }
}
