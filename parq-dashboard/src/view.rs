//! Client-side projection of the parking system.
//!
//! The view is rebuilt purely from relayed messages: each known topic
//! fully replaces its slice of the view (no field merging), so a missed
//! message is healed by the next one on the same topic.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::models::{Envelope, GateKind, GateStatus, HourlyData, ParkingSpace, SystemStats};
use crate::topics::TopicKind;

pub const HOURLY_BUCKETS: usize = 24;

/// A relayed payload is either JSON or opaque text. Non-JSON payloads
/// (raw sensor frames relayed by the bridge) never touch the view.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    /// Latest status per space id; `None` until the first message arrives.
    pub spaces: BTreeMap<u8, Option<ParkingSpace>>,
    pub entry_gate: GateStatus,
    pub exit_gate: GateStatus,
    pub stats: SystemStats,
    pub hourly: Vec<HourlyData>,
    pub updates_applied: u64,
}

impl DashboardView {
    /// Seeded projection shown before any message arrives: all spaces
    /// unknown, both gates closed, zeroed stats, 24 empty buckets.
    pub fn seeded(total_spaces: u8) -> Self {
        let now = Utc::now();
        Self {
            spaces: (1..=total_spaces).map(|id| (id, None)).collect(),
            entry_gate: GateStatus::default(),
            exit_gate: GateStatus::default(),
            stats: SystemStats {
                total_spaces,
                available_spaces: total_spaces,
                ..SystemStats::default()
            },
            hourly: (0..HOURLY_BUCKETS)
                .map(|h| HourlyData {
                    hour: format!("{h:02}:00"),
                    occupied: 0,
                    available: total_spaces,
                    timestamp: now,
                })
                .collect(),
            updates_applied: 0,
        }
    }

    /// Applies one relayed envelope. Returns whether the view changed.
    /// Unknown topics, non-JSON payloads and undecodable payloads are
    /// all soft no-ops.
    pub fn apply_envelope(&mut self, env: &Envelope) -> bool {
        let kind = TopicKind::parse(&env.topic);
        if kind == TopicKind::Unknown {
            trace!(topic = %env.topic, "ignoring message on unknown topic");
            return false;
        }

        let value = match Payload::parse(&env.message) {
            Payload::Json(value) => value,
            Payload::Text(_) => {
                debug!(topic = %env.topic, "non-JSON payload left unapplied");
                return false;
            }
        };

        let applied = match kind {
            TopicKind::SpaceStatus(id) => self.replace_space(id, value),
            TopicKind::GateStatus(gate) => self.replace_gate(gate, value),
            TopicKind::StatsSummary => self.replace_stats(value),
            TopicKind::HourlyAnalytics => self.replace_hourly(value),
            TopicKind::Unknown => unreachable!(),
        };
        if applied {
            self.updates_applied += 1;
        }
        applied
    }

    fn replace_space(&mut self, id: u8, value: Value) -> bool {
        let Some(slot) = self.spaces.get_mut(&id) else {
            debug!(id, "space id outside the configured lot, ignored");
            return false;
        };
        match serde_json::from_value::<ParkingSpace>(value) {
            Ok(mut space) => {
                // keep the previous occupancy visible across the swap
                if space.previous_state.is_none() {
                    space.previous_state = slot.as_ref().map(|s| s.occupied);
                }
                *slot = Some(space);
                true
            }
            Err(e) => {
                warn!(id, error = %e, "undecodable space payload");
                false
            }
        }
    }

    fn replace_gate(&mut self, gate: GateKind, value: Value) -> bool {
        match serde_json::from_value::<GateStatus>(value) {
            Ok(status) => {
                match gate {
                    GateKind::Entry => self.entry_gate = status,
                    GateKind::Exit => self.exit_gate = status,
                }
                true
            }
            Err(e) => {
                warn!(?gate, error = %e, "undecodable gate payload");
                false
            }
        }
    }

    fn replace_stats(&mut self, value: Value) -> bool {
        match serde_json::from_value::<SystemStats>(value) {
            Ok(stats) => {
                self.stats = stats;
                true
            }
            Err(e) => {
                warn!(error = %e, "undecodable stats payload");
                false
            }
        }
    }

    /// The hourly array is replaced wholesale, and only by a payload that
    /// actually carries the full 24 buckets.
    fn replace_hourly(&mut self, value: Value) -> bool {
        match serde_json::from_value::<Vec<HourlyData>>(value) {
            Ok(buckets) if buckets.len() == HOURLY_BUCKETS => {
                self.hourly = buckets;
                true
            }
            Ok(buckets) => {
                warn!(len = buckets.len(), "hourly payload without 24 buckets, ignored");
                false
            }
            Err(e) => {
                warn!(error = %e, "undecodable hourly payload");
                false
            }
        }
    }
}

impl Default for DashboardView {
    fn default() -> Self {
        Self::seeded(3)
    }
}
