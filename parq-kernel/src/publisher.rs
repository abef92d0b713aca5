/**
 * PUBLICATION MQTT - Topics parking vers le backbone
 *
 * RÔLE : Sérialiser les snapshots (emplacements, portons, stats, horaire)
 * et les remettre au broker. Fire-and-forget : une erreur de publish est
 * loggée puis oubliée, jamais propagée au pipeline.
 *
 * TOPICS :
 * - parking/spaces/{id}/status       snapshot complet d'un emplacement
 * - parking/gates/{entry|exit}/status snapshot complet d'un porton
 * - parking/stats/summary            résumé système recalculé
 * - parking/analytics/hourly         tableau des 24 buckets horaires
 */
use rumqttc::{AsyncClient, QoS};
use serde::Serialize;
use std::future::Future;
use time::OffsetDateTime;

use crate::models::{GateKind, GateStatusPayload, SpaceChange};
use crate::state::{ParkingState, Shared};

pub const TOPIC_STATS_SUMMARY: &str = "parking/stats/summary";
pub const TOPIC_HOURLY_ANALYTICS: &str = "parking/analytics/hourly";

/// Couture de publication du pipeline : rumqttc::AsyncClient en production,
/// le stub MQTT du devkit dans les tests.
pub trait MqttPublisher: Send + Sync {
    fn publish_raw(
        &self,
        topic: &str,
        body: String,
    ) -> impl Future<Output = Result<(), String>> + Send;
}

impl MqttPublisher for AsyncClient {
    fn publish_raw(
        &self,
        topic: &str,
        body: String,
    ) -> impl Future<Output = Result<(), String>> + Send {
        async move {
            self.publish(topic, QoS::AtLeastOnce, false, body)
                .await
                .map_err(|e| format!("{e:?}"))
        }
    }
}

#[cfg(test)]
impl MqttPublisher for parq_devkit::MockMqttClient {
    fn publish_raw(
        &self,
        topic: &str,
        body: String,
    ) -> impl Future<Output = Result<(), String>> + Send {
        async move {
            self.publish(topic, QoS::AtLeastOnce, false, body.into_bytes())
                .await
                .map_err(|e| e.to_string())
        }
    }
}

pub fn space_topic(id: u8) -> String {
    format!("parking/spaces/{id}/status")
}

pub fn gate_topic(kind: GateKind) -> String {
    format!("parking/gates/{}/status", kind.as_str())
}

/// Publie un payload JSON, QoS AtLeastOnce, sans accusé attendu.
pub async fn publish_json<T: Serialize, C: MqttPublisher>(client: &C, topic: &str, payload: &T) {
    let body = match serde_json::to_string(payload) {
        Ok(body) => body,
        Err(e) => {
            eprintln!("[publisher] sérialisation impossible pour {topic}: {e}");
            return;
        }
    };
    if let Err(e) = client.publish_raw(topic, body).await {
        eprintln!("[publisher] publish {topic} échoué: {e}");
    }
}

pub async fn publish_space<C: MqttPublisher>(
    client: &C,
    state: &Shared<ParkingState>,
    id: u8,
    change: Option<SpaceChange>,
) {
    let payload = { state.lock().space_payload(id, change) };
    if let Some(payload) = payload {
        publish_json(client, &space_topic(id), &payload).await;
    }
}

pub async fn publish_gate<C: MqttPublisher>(
    client: &C,
    kind: GateKind,
    payload: &GateStatusPayload,
) {
    publish_json(client, &gate_topic(kind), payload).await;
}

pub async fn publish_stats<C: MqttPublisher>(client: &C, state: &Shared<ParkingState>) {
    let payload = { state.lock().stats_summary(OffsetDateTime::now_utc()) };
    publish_json(client, TOPIC_STATS_SUMMARY, &payload).await;
}

pub async fn publish_hourly<C: MqttPublisher>(client: &C, buckets: &[crate::models::HourlyBucket]) {
    publish_json(client, TOPIC_HOURLY_ANALYTICS, &buckets).await;
}

/// Publication initiale complète au démarrage : chaque consommateur en aval
/// reçoit toujours la valeur courante entière, jamais un delta.
pub async fn publish_initial_state<C: MqttPublisher>(client: &C, state: &Shared<ParkingState>) {
    println!("[publisher] publication de l'état initial...");
    let (ids, hourly) = {
        let st = state.lock();
        (st.space_ids(), st.hourly_snapshot())
    };
    for id in ids {
        publish_space(client, state, id, None).await;
    }
    for kind in [GateKind::Entry, GateKind::Exit] {
        let payload = { state.lock().gate_payload(kind, None) };
        publish_gate(client, kind, &payload).await;
    }
    publish_stats(client, state).await;
    publish_hourly(client, &hourly).await;
    println!("[publisher] état initial publié");
}
