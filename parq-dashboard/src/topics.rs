//! Topic routing for relayed backbone messages.

use crate::models::GateKind;

/// What a relayed topic refers to. Anything outside the known parking
/// topic set maps to `Unknown` and is ignored by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    SpaceStatus(u8),
    GateStatus(GateKind),
    StatsSummary,
    HourlyAnalytics,
    Unknown,
}

impl TopicKind {
    pub fn parse(topic: &str) -> Self {
        match topic {
            "parking/stats/summary" => return TopicKind::StatsSummary,
            "parking/analytics/hourly" => return TopicKind::HourlyAnalytics,
            "parking/gates/entry/status" => return TopicKind::GateStatus(GateKind::Entry),
            "parking/gates/exit/status" => return TopicKind::GateStatus(GateKind::Exit),
            _ => {}
        }

        if let Some(rest) = topic.strip_prefix("parking/spaces/") {
            if let Some(id) = rest.strip_suffix("/status") {
                if let Ok(id) = id.parse::<u8>() {
                    return TopicKind::SpaceStatus(id);
                }
            }
        }
        TopicKind::Unknown
    }
}
