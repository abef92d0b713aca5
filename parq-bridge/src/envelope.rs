use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Enveloppe relayée telle quelle aux navigateurs : topic d'origine,
/// payload brut (souvent du JSON, retransmis sans réinterprétation)
/// et horodatage de passage au pont en millisecondes epoch.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Envelope {
    pub topic: String,
    pub message: String,
    pub timestamp: i64,
}

impl Envelope {
    pub fn now(topic: &str, message: &str) -> Self {
        Self {
            topic: topic.to_string(),
            message: message.to_string(),
            timestamp: unix_millis(OffsetDateTime::now_utc()),
        }
    }

    /// Texte envoyé sur chaque socket. Le payload reste une chaîne même
    /// quand il contient du JSON : c'est au consommateur de le re-parser.
    pub fn to_ws_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_keeps_payload_as_opaque_text() {
        let env = Envelope {
            topic: "parking/stats/summary".into(),
            message: r#"{"totalSpaces":3}"#.into(),
            timestamp: 1_700_000_000_000,
        };
        let txt = env.to_ws_text();
        let v: serde_json::Value = serde_json::from_str(&txt).unwrap();
        // message reste une chaîne JSON, pas un objet imbriqué
        assert!(v["message"].is_string());
        assert_eq!(v["topic"], "parking/stats/summary");
        assert_eq!(v["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn unix_millis_converts_whole_seconds() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(unix_millis(at), 1_700_000_000_000);
    }

    #[test]
    fn envelope_round_trips() {
        let env = Envelope::now("parking/spaces/1/status", "{\"occupied\":true}");
        let back: Envelope = serde_json::from_str(&env.to_ws_text()).unwrap();
        assert_eq!(back, env);
    }
}
